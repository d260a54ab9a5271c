use std::{path::PathBuf, time::Instant};

use brokkr::{
    config::ConversionConfig,
    convert::{Converter, MujocoViewer},
};
use clap::Parser;
use colored::Colorize;
use indicatif::HumanDuration;
use miette::Result;
use tracing::info;

/// Convert a urdf robot description into a mujoco scene.
///
/// The urdf and its meshes are staged in a temporary directory and opened in the mujoco viewer.
/// Press `Save XML` in the viewer and close it, after which motors, joint sensors and joint
/// parameters are added to the saved scene and it is written to `output`.
#[derive(Parser, Debug)]
#[clap(name = "urdf2mjcf", version)]
struct Urdf2Mjcf {
    /// The urdf to convert.
    input: PathBuf,

    /// Where to write the mjcf scene.
    output: PathBuf,

    /// Toml file merged on top of the default conversion config.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Python interpreter with the `mujoco` package installed.
    #[clap(long, default_value = "python")]
    python: String,
}

impl Urdf2Mjcf {
    fn run(self) -> Result<()> {
        let started = Instant::now();

        let config = ConversionConfig::load(self.config.as_deref())?;
        let viewer = MujocoViewer {
            python: self.python,
        };
        let report = Converter::new(config).run(&self.input, &self.output, &viewer)?;

        info!(
            "Added {} motors and {} sensors, restored {} mesh references",
            report.synthesis.motors(),
            report.synthesis.sensors(),
            report.restored,
        );
        info!(
            "Annotated {} joints, {} with default parameters",
            report.annotation.matched.len() + report.annotation.unmatched.len(),
            report.annotation.unmatched.len(),
        );

        println!(
            "{} writing {} in {}",
            "    Finished".cyan().bold(),
            report.output.display(),
            HumanDuration(started.elapsed()),
        );

        Ok(())
    }
}

fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt::init();

    Urdf2Mjcf::parse().run()
}
