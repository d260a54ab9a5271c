//! Export of an onshape assembly into a urdf with meshes in the robot's `meshes/` folder.
//!
//! Expected layout, relative to the export config:
//!
//! ```text
//! <robot>/
//! ├── scad/          optional collider shapes copied next to the exporter output
//! ├── meshes/        merged meshes end up here
//! └── urdf/
//!     ├── config.json
//!     ├── assets/    exporter output, removed afterwards
//!     └── <output_filename>.urdf
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Mesh prefix written by the exporter.
pub const MERGED_PREFIX: &str = "assets/merged/";
/// Mesh prefix pointing at the robot's `meshes/` folder.
pub const MESHES_PREFIX: &str = "../meshes/";
/// Scheme the exporter puts in front of mesh references, stripped so they resolve as plain paths.
pub const PACKAGE_SCHEME: &str = "package://";

/// The exporter config, shared with `onshape-to-robot`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// File name of the exported urdf, without extension.
    pub output_filename: String,

    /// Settings only read by the exporter itself.
    #[serde(flatten)]
    pub exporter: Map<String, Value>,
}

impl ExportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }

        let config = fs::read_to_string(path).map_err(Error::io(path))?;
        Ok(serde_json::from_str(&config)?)
    }
}

/// External tool that exports a cad assembly into a urdf.
pub trait CadExporter {
    /// Export into `urdf_dir`, which contains the export config.
    fn export(&self, urdf_dir: &Path) -> Result<()>;
}

/// Runs `onshape-to-robot <urdf_dir>`.
#[derive(Debug, Clone, Default)]
pub struct OnshapeToRobot;

impl CadExporter for OnshapeToRobot {
    fn export(&self, urdf_dir: &Path) -> Result<()> {
        info!("Running onshape-to-robot on {}", urdf_dir.display());

        let status = Command::new("onshape-to-robot")
            .arg(urdf_dir)
            .status()
            .map_err(|source| {
                Error::Converter(format!("failed to launch `onshape-to-robot`: {source}"))
            })?;

        if !status.success() {
            return Err(Error::Converter(format!(
                "onshape-to-robot exited with {status}"
            )));
        }

        Ok(())
    }
}

/// Exports the robot described by an export config.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    /// Keep the exporter's `assets/` folder instead of removing it afterwards.
    pub keep_temp_files: bool,
}

impl Exporter {
    /// Run the export for the config at `config_path`, returning the path of the urdf.
    pub fn run(&self, config_path: &Path, exporter: &impl CadExporter) -> Result<PathBuf> {
        let config = ExportConfig::load(config_path)?;

        let urdf_dir = config_path.parent().unwrap_or(Path::new(""));
        let robot_dir = urdf_dir.parent().unwrap_or(Path::new(""));
        let assets_dir = urdf_dir.join("assets");

        let scad_dir = robot_dir.join("scad");
        if scad_dir.is_dir() {
            copy_files(&scad_dir, &assets_dir)?;
        }

        exporter.export(urdf_dir)?;

        let merged_dir = assets_dir.join("merged");
        if merged_dir.is_dir() {
            copy_tree(&merged_dir, &robot_dir.join("meshes"))?;
        }

        if !self.keep_temp_files {
            if let Err(error) = fs::remove_dir_all(&assets_dir) {
                debug!("Could not remove {}: {error}", assets_dir.display());
            }
        }

        let urdf_path = urdf_dir.join(format!("{}.urdf", config.output_filename));
        let replaced = relocate_mesh_prefix(&urdf_path)?;
        info!(
            "Pointed {replaced} mesh references in {} at {MESHES_PREFIX}",
            urdf_path.display()
        );

        Ok(urdf_path)
    }
}

/// Replace [`MERGED_PREFIX`] with [`MESHES_PREFIX`] in the urdf at `path`, then strip every
/// [`PACKAGE_SCHEME`].
///
/// Returns the number of relocated references.
pub fn relocate_mesh_prefix(path: &Path) -> Result<usize> {
    let urdf = fs::read_to_string(path).map_err(Error::io(path))?;

    let count = urdf.matches(MERGED_PREFIX).count();
    if count == 0 {
        warn!("No `{MERGED_PREFIX}` references found in {}", path.display());
    }

    let urdf = urdf
        .replace(MERGED_PREFIX, MESHES_PREFIX)
        .replace(PACKAGE_SCHEME, "");
    fs::write(path, urdf).map_err(Error::io(path))?;
    Ok(count)
}

/// Copy the files directly inside `source` into `destination`.
fn copy_files(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(Error::io(destination))?;

    for entry in fs::read_dir(source).map_err(Error::io(source))? {
        let entry = entry.map_err(Error::io(source))?;
        if entry.file_type().map_err(Error::io(entry.path()))?.is_file() {
            fs::copy(entry.path(), destination.join(entry.file_name()))
                .map_err(Error::io(entry.path()))?;
        }
    }

    Ok(())
}

/// Recursively copy `source` into `destination`, overwriting existing files.
fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|error| Error::Io {
            path: source.to_path_buf(),
            source: io::Error::from(error),
        })?;

        let relative = entry.path().strip_prefix(source).map_err(|error| Error::Io {
            path: entry.path().to_path_buf(),
            source: io::Error::other(error),
        })?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(Error::io(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(Error::io(entry.path()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Writes what `onshape-to-robot` would: a urdf and merged meshes under `assets/`.
    struct FakeExporter {
        called: Cell<bool>,
    }

    impl CadExporter for FakeExporter {
        fn export(&self, urdf_dir: &Path) -> Result<()> {
            self.called.set(true);
            let merged = urdf_dir.join("assets/merged");
            fs::create_dir_all(merged.join("parts")).unwrap();
            fs::write(merged.join("torso.stl"), "torso").unwrap();
            fs::write(merged.join("parts/head.stl"), "head").unwrap();
            fs::write(
                urdf_dir.join("miku.urdf"),
                r#"<robot><mesh filename="package://assets/merged/torso.stl"/><mesh filename="package://assets/merged/parts/head.stl"/></robot>"#,
            )
            .unwrap();
            Ok(())
        }
    }

    fn fake() -> FakeExporter {
        FakeExporter {
            called: Cell::new(false),
        }
    }

    fn robot_dir() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("urdf/config.json");
        fs::create_dir_all(config.parent().unwrap()).unwrap();
        fs::write(
            &config,
            r#"{"documentId": "abc", "output_filename": "miku", "merge_stls": true}"#,
        )
        .unwrap();
        (dir, config)
    }

    #[test]
    fn export_moves_meshes_and_rewrites_prefix() {
        let (robot, config) = robot_dir();
        fs::create_dir_all(robot.path().join("scad")).unwrap();
        fs::write(robot.path().join("scad/foot.scad"), "cube();").unwrap();
        let exporter = fake();

        let urdf = Exporter::default().run(&config, &exporter).unwrap();

        assert!(exporter.called.get());
        assert_eq!(urdf, robot.path().join("urdf/miku.urdf"));
        assert_eq!(
            fs::read_to_string(&urdf).unwrap(),
            r#"<robot><mesh filename="../meshes/torso.stl"/><mesh filename="../meshes/parts/head.stl"/></robot>"#
        );
        assert!(robot.path().join("meshes/torso.stl").is_file());
        assert!(robot.path().join("meshes/parts/head.stl").is_file());
        assert!(!robot.path().join("urdf/assets").exists());
    }

    #[test]
    fn temp_files_can_be_kept() {
        let (robot, config) = robot_dir();
        fs::create_dir_all(robot.path().join("scad")).unwrap();
        fs::write(robot.path().join("scad/foot.scad"), "cube();").unwrap();

        Exporter {
            keep_temp_files: true,
        }
        .run(&config, &fake())
        .unwrap();

        assert!(robot.path().join("urdf/assets/foot.scad").is_file());
        assert!(robot.path().join("urdf/assets/merged/torso.stl").is_file());
    }

    #[test]
    fn missing_config_fails_before_exporting() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = fake();

        let result = Exporter::default().run(&dir.path().join("urdf/config.json"), &exporter);

        assert!(matches!(result, Err(Error::MissingFile(_))));
        assert!(!exporter.called.get());
    }

    #[test]
    fn copy_tree_overwrites_existing_meshes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("merged");
        let destination = dir.path().join("meshes");
        fs::create_dir_all(source.join("parts")).unwrap();
        fs::create_dir_all(&destination).unwrap();
        fs::write(source.join("parts/head.stl"), "new head").unwrap();
        fs::write(destination.join("torso.stl"), "kept").unwrap();
        fs::create_dir_all(destination.join("parts")).unwrap();
        fs::write(destination.join("parts/head.stl"), "old head").unwrap();

        copy_tree(&source, &destination).unwrap();

        assert_eq!(
            fs::read_to_string(destination.join("parts/head.stl")).unwrap(),
            "new head"
        );
        assert_eq!(fs::read_to_string(destination.join("torso.stl")).unwrap(), "kept");
    }

    #[test]
    fn package_scheme_is_stripped_from_relocated_references() {
        let dir = tempfile::tempdir().unwrap();
        let urdf = dir.path().join("miku.urdf");
        fs::write(
            &urdf,
            r#"<robot><mesh filename="package://assets/merged/torso.stl"/><mesh filename="package://other/base.stl"/></robot>"#,
        )
        .unwrap();

        assert_eq!(relocate_mesh_prefix(&urdf).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(&urdf).unwrap(),
            r#"<robot><mesh filename="../meshes/torso.stl"/><mesh filename="other/base.stl"/></robot>"#
        );
    }

    #[test]
    fn config_keeps_exporter_settings() {
        let (_robot, config) = robot_dir();

        let config = ExportConfig::load(&config).unwrap();

        assert_eq!(config.output_filename, "miku");
        assert_eq!(config.exporter["documentId"], "abc");
    }

    #[test]
    fn config_without_output_filename_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, r#"{"documentId": "abc"}"#).unwrap();

        assert!(matches!(ExportConfig::load(&config), Err(Error::Json(_))));
    }
}
