//! CLI command definitions using clap

use crate::CliError;
use crate::output::OutputFormat;
use clap::{Parser, Subcommand};
use hotswap_core::{HostConfig, Vec3};
use std::path::{Path, PathBuf};

/// Hotswap CLI - Run batches through a module that can be rebuilt while the host runs
#[derive(Parser)]
#[command(name = "hotswap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the module path resolved for a base directory
    Resolve {
        /// Directory the module is deployed to
        #[arg(short, long, env = "HOTSWAP_BASE_DIR")]
        base_dir: Option<PathBuf>,
    },

    /// Transform one batch of points and exit
    Apply {
        /// Directory the module is deployed to
        #[arg(short, long, env = "HOTSWAP_BASE_DIR")]
        base_dir: Option<PathBuf>,

        /// Weight passed with every point
        #[arg(short, long)]
        weight: Option<f32>,

        /// Points as x,y,z
        #[arg(value_parser = parse_point, allow_hyphen_values = true)]
        points: Vec<Vec3>,
    },

    /// Transform a batch on every tick, picking up module rebuilds
    Watch {
        /// Directory the module is deployed to
        #[arg(short, long, env = "HOTSWAP_BASE_DIR")]
        base_dir: Option<PathBuf>,

        /// Weight passed with every point
        #[arg(short, long)]
        weight: Option<f32>,

        /// Milliseconds between batches
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Number of partitions dispatched concurrently
        #[arg(short, long)]
        partitions: Option<usize>,

        /// Stop after this many batches
        #[arg(short = 'n', long)]
        iterations: Option<u64>,

        /// Points as x,y,z
        #[arg(value_parser = parse_point, allow_hyphen_values = true)]
        points: Vec<Vec3>,
    },
}

/// Parse a point written as `x,y,z`
pub fn parse_point(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts[..] else {
        return Err(format!("expected x,y,z but got '{s}'"));
    };
    let axis = |v: &str| {
        v.parse::<f32>()
            .map_err(|e| format!("invalid coordinate '{v}': {e}"))
    };
    Ok(Vec3::new(axis(x)?, axis(y)?, axis(z)?))
}

/// Build the host configuration from `--config` and `--base-dir`
///
/// The flag wins over the file's `base_dir`; one of them must be present.
pub fn host_config(
    config_path: Option<&Path>,
    base_dir: Option<PathBuf>,
) -> Result<HostConfig, CliError> {
    match (config_path, base_dir) {
        (Some(path), base_dir) => {
            let mut config = HostConfig::load(path)?;
            if let Some(base_dir) = base_dir {
                config.base_dir = base_dir;
            }
            Ok(config)
        }
        (None, Some(base_dir)) => Ok(HostConfig::new(base_dir)),
        (None, None) => Err(CliError::ConfigError(
            "no base directory: pass --base-dir or --config".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1,2,3").unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(parse_point(" -1.5, 0 ,2e1").unwrap(), Vec3::new(-1.5, 0.0, 20.0));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,2,3,4").is_err());
        assert!(parse_point("1,two,3").is_err());
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "hotswap", "apply", "--base-dir", "/plugins", "-w", "2", "1,2,3", "0,-1,1",
        ])
        .unwrap();
        let Commands::Apply {
            base_dir,
            weight,
            points,
        } = cli.command
        else {
            panic!("expected apply");
        };
        assert_eq!(base_dir, Some(PathBuf::from("/plugins")));
        assert_eq!(weight, Some(2.0));
        assert_eq!(points, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, -1.0, 1.0)]);
    }

    #[test]
    fn test_parse_watch_with_globals() {
        let cli = Cli::try_parse_from([
            "hotswap", "watch", "-b", "/plugins", "-p", "4", "-n", "3", "-o", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        let Commands::Watch {
            partitions,
            iterations,
            points,
            ..
        } = cli.command
        else {
            panic!("expected watch");
        };
        assert_eq!(partitions, Some(4));
        assert_eq!(iterations, Some(3));
        assert!(points.is_empty());
    }

    #[test]
    fn test_host_config_requires_base_dir() {
        assert!(matches!(host_config(None, None), Err(CliError::ConfigError(_))));
        let config = host_config(None, Some(PathBuf::from("/plugins"))).unwrap();
        assert_eq!(config, HostConfig::new("/plugins"));
    }

    #[test]
    fn test_base_dir_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "base_dir = \"/from/file\"\npartitions = 3\n").unwrap();

        let config = host_config(Some(&path), None).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/from/file"));
        assert_eq!(config.partitions, 3);

        let config = host_config(Some(&path), Some(PathBuf::from("/from/flag"))).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.partitions, 3);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Cli::try_parse_from(["hotswap", "watch", "-b", "/plugins", "-i", "0"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["hotswap", "watch", "-b", "/plugins", "-i", "1"]).unwrap();
        let Commands::Watch { interval_ms, .. } = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(interval_ms, Some(1));
    }
}
