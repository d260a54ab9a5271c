use std::{path::PathBuf, time::Instant};

use brokkr::export::{Exporter, OnshapeToRobot};
use clap::Parser;
use colored::Colorize;
use indicatif::HumanDuration;
use miette::Result;

/// Export an onshape assembly into a urdf robot description.
///
/// Runs `onshape-to-robot` next to the export config, moves the merged meshes into the robot's
/// `meshes/` folder and points the urdf at them.
#[derive(Parser, Debug)]
#[clap(name = "onshape2urdf", version)]
struct Onshape2Urdf {
    /// The `onshape-to-robot` export config.
    #[clap(long, default_value = "./data/miku/urdf/config.json")]
    config: PathBuf,

    /// Keep the exporter's temporary `assets/` folder.
    #[clap(long)]
    keep_temp_files: bool,
}

impl Onshape2Urdf {
    fn run(self) -> Result<()> {
        let started = Instant::now();

        let exporter = Exporter {
            keep_temp_files: self.keep_temp_files,
        };
        let urdf = exporter.run(&self.config, &OnshapeToRobot)?;

        println!(
            "{} writing {} in {}",
            "    Finished".cyan().bold(),
            urdf.display(),
            HumanDuration(started.elapsed()),
        );

        Ok(())
    }
}

fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt::init();

    Onshape2Urdf::parse().run()
}
