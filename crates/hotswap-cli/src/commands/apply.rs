//! `hotswap apply` command implementation

use crate::CliError;
use crate::output::{BatchReport, OutputFormat};
use hotswap_core::{Host, HostConfig, Vec3};

/// Execute the `apply` command
pub fn run(config: &HostConfig, points: &[Vec3], format: OutputFormat) -> Result<(), CliError> {
    let host = Host::from_config(config)?;
    let result = host.apply_batch(points, config.weight);
    let stats = host.coordinator().stats();
    host.shutdown();

    let transformed = result?;
    let report = BatchReport {
        iteration: None,
        weight: config.weight,
        points: &transformed,
        stats,
    };
    println!("{}", report.render(format)?);
    Ok(())
}
