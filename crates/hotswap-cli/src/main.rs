//! Hotswap CLI - Host process driving batches through a hot-swappable module

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

pub use error::CliError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli))?;
    Ok(())
}

async fn run_command(cli: Cli) -> Result<(), CliError> {
    let format = cli.output.unwrap_or_default();

    match cli.command {
        Commands::Resolve { base_dir } => {
            let config = cli::host_config(cli.config.as_deref(), base_dir)?;
            commands::resolve::run(&config, format)?;
        }

        Commands::Apply {
            base_dir,
            weight,
            points,
        } => {
            let mut config = cli::host_config(cli.config.as_deref(), base_dir)?;
            if let Some(weight) = weight {
                config.weight = weight;
            }
            commands::apply::run(&config, &points, format)?;
        }

        Commands::Watch {
            base_dir,
            weight,
            interval_ms,
            partitions,
            iterations,
            points,
        } => {
            let mut config = cli::host_config(cli.config.as_deref(), base_dir)?;
            if let Some(weight) = weight {
                config.weight = weight;
            }
            if let Some(interval_ms) = interval_ms {
                config.poll_interval_ms = interval_ms;
            }
            if let Some(partitions) = partitions {
                config.partitions = partitions;
            }
            config.validate()?;
            commands::watch::run(&config, &points, iterations, format).await?;
        }
    }

    Ok(())
}
