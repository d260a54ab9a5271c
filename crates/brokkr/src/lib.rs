//! `brokkr` forges robot descriptions.
//!
//! Two pipelines live here:
//! - [`export`] turns an onshape assembly into a urdf, using `onshape-to-robot`.
//! - [`convert`] turns a urdf into a mujoco scene with motors, sensors and tuned joints.

pub mod actuators;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod joint_params;
pub mod mesh;
pub mod rewrite;
pub mod workspace;
pub mod xml;

pub use error::{Error, Result};
