//! Temporary workspace the urdf and its meshes are staged into before converting.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    config::ConversionConfig,
    error::{Error, Result},
    mesh::MeshFolders,
    rewrite::{PathSubstitution, PathSubstitutions},
    xml::Document,
};

/// Extension of the mesh files that are staged, compared case-insensitively.
pub const MESH_EXTENSION: &str = "stl";

const URDF_DIR: &str = "urdf";
const MESH_DIR: &str = "meshes";

/// An isolated directory with an `urdf/` and a `meshes/` folder.
///
/// The directory and everything in it is removed when the workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

/// A mesh file copied into the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMesh {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Result of [`Workspace::stage`].
#[derive(Debug)]
pub struct Staged {
    /// The urdf inside the workspace.
    pub description: PathBuf,
    pub meshes: Vec<StagedMesh>,
    /// Renamed meshes, needed to restore the references after converting.
    pub substitutions: PathSubstitutions,
}

impl Workspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("brokkr-")
            .tempdir()
            .map_err(Error::io(std::env::temp_dir()))?;

        let workspace = Self { dir };
        for dir in [workspace.urdf_dir(), workspace.mesh_dir()] {
            fs::create_dir_all(&dir).map_err(Error::io(dir))?;
        }

        debug!("Created workspace at {}", workspace.path().display());
        Ok(workspace)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn urdf_dir(&self) -> PathBuf {
        self.path().join(URDF_DIR)
    }

    #[must_use]
    pub fn mesh_dir(&self) -> PathBuf {
        self.path().join(MESH_DIR)
    }

    /// Copy the urdf at `description` and the meshes in `folders` into the workspace.
    ///
    /// The mujoco compiler options from `config` are added to the staged urdf, and meshes from
    /// folders other than [`ConversionConfig::mesh_dir_name`] are prefixed with their folder name.
    pub fn stage(
        &self,
        description: &Path,
        folders: &MeshFolders,
        config: &ConversionConfig,
    ) -> Result<Staged> {
        let file_name = description
            .file_name()
            .ok_or_else(|| Error::MissingFile(description.to_path_buf()))?;
        let staged_description = self.urdf_dir().join(file_name);

        fs::copy(description, &staged_description).map_err(Error::io(description))?;

        let mut document = Document::read(&staged_description)?;
        document.root.push(config.compiler.to_element());

        let source_dir = description.parent().unwrap_or(Path::new(""));
        let mut meshes = Vec::new();
        let mut substitutions = PathSubstitutions::default();

        for folder in folders.iter() {
            let rename = folder
                .file_name()
                .is_none_or(|name| name != config.mesh_dir_name.as_str());

            for source in find_meshes(&source_dir.join(folder))? {
                let Some(mesh_name) = source.file_name().map(|name| name.to_string_lossy()) else {
                    continue;
                };

                let target_name = if rename {
                    let substitution = PathSubstitution::for_mesh(folder, &mesh_name);
                    let renamed = substitution.renamed.clone();
                    substitutions.record(substitution);
                    renamed
                } else {
                    mesh_name.into_owned()
                };

                let target = self.mesh_dir().join(target_name);
                info!("Found mesh file: {} -> {}", source.display(), target.display());
                fs::copy(&source, &target).map_err(Error::io(&source))?;

                meshes.push(StagedMesh { source, target });
            }
        }

        substitutions.apply(&mut document);
        document.write(&staged_description)?;

        Ok(Staged {
            description: staged_description,
            meshes,
            substitutions,
        })
    }

    /// Remove the workspace, reporting failures instead of ignoring them like dropping does.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        debug!("Removing workspace at {}", path.display());
        self.dir.close().map_err(Error::io(path))
    }
}

fn is_mesh_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case(MESH_EXTENSION))
}

/// All mesh files below `folder`, sorted by path.
fn find_meshes(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::MissingFile(folder.to_path_buf()));
    }

    let mut meshes = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|error| {
            let path = error
                .path()
                .map_or_else(|| folder.to_path_buf(), Path::to_path_buf);
            Error::Io {
                source: error.into(),
                path,
            }
        })?;

        if entry.file_type().is_file() && is_mesh_file(entry.path()) {
            meshes.push(entry.into_path());
        }
    }

    Ok(meshes)
}
