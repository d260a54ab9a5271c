use std::{fs, path::Path};

use serde::Deserialize;
use toml::{Table, Value};

use crate::{
    error::{Error, Result},
    joint_params::{JointParamEntry, JointParams},
    xml::Element,
};

/// Configuration used when none is supplied, see `config/conversion.toml`.
pub const DEFAULT_CONFIG: &str = include_str!("../config/conversion.toml");

/// Configuration for the urdf to mjcf conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    /// Name of the canonical mesh folder, files in it keep their name when staged.
    #[serde(default = "default_mesh_dir_name")]
    pub mesh_dir_name: String,

    #[serde(default)]
    pub compiler: CompilerOptions,

    #[serde(default)]
    pub actuator: ActuatorConfig,

    /// Parameters for joints that no entry in [`ConversionConfig::joints`] matches.
    #[serde(default)]
    pub defaults: JointDefaults,

    /// Friction and armature table, in declaration order.
    #[serde(rename = "joint", default)]
    pub joints: Vec<JointParamEntry>,
}

fn default_mesh_dir_name() -> String {
    "meshes".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mesh_dir_name: default_mesh_dir_name(),
            compiler: CompilerOptions::default(),
            actuator: ActuatorConfig::default(),
            defaults: JointDefaults::default(),
            joints: Vec::new(),
        }
    }
}

impl ConversionConfig {
    /// Load the embedded default configuration, with the toml file at `overlay` merged on top.
    pub fn load(overlay: Option<&Path>) -> Result<Self> {
        let main: Table = toml::from_str(DEFAULT_CONFIG)?;

        let merged = match overlay {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::MissingFile(path.to_path_buf()));
                }

                let overlay = fs::read_to_string(path).map_err(Error::io(path))?;
                merge_tables(main, toml::from_str(&overlay)?)
            }
            None => main,
        };

        Ok(Value::Table(merged).try_into()?)
    }

    /// The embedded default configuration.
    pub fn embedded() -> Result<Self> {
        Self::load(None)
    }
}

/// Merge `overlay` into `main`.
///
/// Tables present in both are merged recursively, any other value in `overlay` replaces the one
/// in `main`. Keys only present in `overlay` are added.
#[must_use]
pub fn merge_tables(main: Table, mut overlay: Table) -> Table {
    let mut merged = Table::new();

    for (key, value) in main {
        let value = match (value, overlay.remove(&key)) {
            (Value::Table(main), Some(Value::Table(overlay))) => {
                Value::Table(merge_tables(main, overlay))
            }
            (_, Some(overlay)) => overlay,
            (value, None) => value,
        };

        merged.insert(key, value);
    }

    merged.extend(overlay);
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Radian,
    Degree,
}

impl AngleUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AngleUnit::Radian => "radian",
            AngleUnit::Degree => "degree",
        }
    }
}

/// Options for the mujoco `<compiler>` element that is injected into the urdf before converting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Mesh directory relative to the staged urdf.
    pub meshdir: String,
    pub discardvisual: bool,
    pub fusestatic: bool,
    pub angle: AngleUnit,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            meshdir: "../meshes/".to_string(),
            discardvisual: false,
            fusestatic: false,
            angle: AngleUnit::Radian,
        }
    }
}

impl CompilerOptions {
    /// Build the `<mujoco><compiler .../></mujoco>` block understood by the mujoco urdf importer.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let compiler = Element::new("compiler")
            .with_attr("meshdir", &self.meshdir)
            .with_attr("discardvisual", self.discardvisual.to_string())
            .with_attr("fusestatic", self.fusestatic.to_string())
            .with_attr("angle", self.angle.as_str());

        let mut mujoco = Element::new("mujoco");
        mujoco.push(compiler);
        mujoco
    }
}

/// Settings for the synthesized motors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Symmetric placeholder range written to every motor.
    pub force_range: [f64; 2],
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            force_range: [-10.0, 10.0],
        }
    }
}

impl ActuatorConfig {
    /// Value of the `forcerange` attribute, e.g. `-10 10`.
    #[must_use]
    pub fn force_range_attr(&self) -> String {
        format!("{} {}", self.force_range[0], self.force_range[1])
    }
}

/// Fallback friction loss and armature.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct JointDefaults {
    pub friction_loss: f64,
    pub armature: f64,
}

impl Default for JointDefaults {
    fn default() -> Self {
        Self {
            friction_loss: 0.05,
            armature: 0.001,
        }
    }
}

impl From<JointDefaults> for JointParams {
    fn from(value: JointDefaults) -> Self {
        Self {
            friction_loss: Some(value.friction_loss),
            armature: Some(value.armature),
        }
    }
}
