//! The urdf to mjcf conversion pipeline.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{error, info, warn};

use crate::{
    actuators::{self, Synthesis},
    config::ConversionConfig,
    error::{Error, Result},
    joint_params::{self, Annotation, JointParamTable},
    mesh,
    rewrite::PathSubstitutions,
    workspace::{StagedMesh, Workspace},
    xml::Document,
};

/// File the mujoco viewer writes when pressing `Save XML`.
pub const SCENE_FILE_NAME: &str = "mjmodel.xml";

/// External tool that turns a staged urdf into an mjcf scene.
pub trait SceneConverter {
    /// Convert the urdf at `description`, running inside `workdir`.
    ///
    /// Returns the path of the produced scene. This may block for as long as the tool needs.
    fn convert(&self, workdir: &Path, description: &Path) -> Result<PathBuf>;
}

/// Converts by opening the urdf in the mujoco viewer, which exports the scene when the operator
/// presses `Save XML`.
#[derive(Debug, Clone)]
pub struct MujocoViewer {
    /// Python interpreter with the `mujoco` package installed.
    pub python: String,
}

impl Default for MujocoViewer {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
        }
    }
}

impl SceneConverter for MujocoViewer {
    fn convert(&self, workdir: &Path, description: &Path) -> Result<PathBuf> {
        let file_name = description
            .file_name()
            .ok_or_else(|| Error::MissingFile(description.to_path_buf()))?;

        info!("Launching mujoco viewer...");
        info!("Click `Save XML` in the viewer to save the scene, then close the viewer.");

        let status = Command::new(&self.python)
            .args(["-m", "mujoco.viewer", "--mjcf"])
            .arg(file_name)
            .current_dir(workdir)
            .status()
            .map_err(|source| {
                Error::Converter(format!("failed to launch `{}`: {source}", self.python))
            })?;

        if !status.success() {
            return Err(Error::Converter(format!(
                "mujoco viewer exited with {status}"
            )));
        }

        let scene = workdir.join(SCENE_FILE_NAME);
        if !scene.is_file() {
            return Err(Error::Converter(format!(
                "`{}` was not written, was `Save XML` pressed before closing the viewer?",
                scene.display()
            )));
        }

        Ok(scene)
    }
}

/// Summary of a [`Converter::run`].
#[derive(Debug)]
pub struct Report {
    pub output: PathBuf,
    pub meshes: Vec<StagedMesh>,
    /// Number of renamed meshes.
    pub substitutions: usize,
    /// Number of mesh references in the scene pointed back at the original files.
    pub restored: usize,
    pub synthesis: Synthesis,
    pub annotation: Annotation,
}

/// Converts urdf files into mjcf scenes with actuators, sensors and joint parameters.
#[derive(Debug)]
pub struct Converter {
    config: ConversionConfig,
    table: JointParamTable,
}

impl Converter {
    #[must_use]
    pub fn new(config: ConversionConfig) -> Self {
        let table = JointParamTable::new(config.joints.iter().cloned(), config.defaults);
        Self { config, table }
    }

    #[must_use]
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert the urdf at `input` into an mjcf scene at `output`.
    ///
    /// The urdf and its meshes are staged in a temporary workspace that is removed again once
    /// this returns, whether the conversion succeeded or not. Once the scene is written, failing
    /// to remove the workspace is only logged.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        converter: &impl SceneConverter,
    ) -> Result<Report> {
        if !input.is_file() {
            return Err(Error::MissingFile(input.to_path_buf()));
        }

        let folders = mesh::read_mesh_folders(input)
            .inspect_err(|error| error!("Failed to locate the mesh folders: {error}"))?;

        let workspace = Workspace::create()?;
        let staged = workspace.stage(input, &folders, &self.config)?;
        info!(
            "Staged {} meshes from {} folders",
            staged.meshes.len(),
            folders.len()
        );

        let scene_path = converter.convert(&workspace.urdf_dir(), &staged.description)?;
        let mut scene = Document::read(&scene_path)?;

        let synthesis = actuators::synthesize(&mut scene, &self.config.actuator);
        let annotation = joint_params::annotate(&mut scene, &self.table);
        let restored = finalize(&mut scene, output, &staged.substitutions)?;

        if let Err(error) = workspace.close() {
            warn!("Scene written, but the workspace could not be removed: {error}");
        }

        Ok(Report {
            output: output.to_path_buf(),
            meshes: staged.meshes,
            substitutions: staged.substitutions.len(),
            restored,
            synthesis,
            annotation,
        })
    }
}

/// Point the mesh references of `scene` back at the original files and write it to `output`.
///
/// Missing parent directories of `output` are created. Returns the number of restored references.
pub fn finalize(
    scene: &mut Document,
    output: &Path,
    substitutions: &PathSubstitutions,
) -> Result<usize> {
    let restored = substitutions.revert(scene);

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(Error::io(parent))?;
    }

    scene.write(output)?;
    Ok(restored)
}
