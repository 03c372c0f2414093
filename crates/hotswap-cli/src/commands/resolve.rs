//! `hotswap resolve` command implementation

use crate::CliError;
use crate::output::OutputFormat;
use hotswap_core::HostConfig;

/// Execute the `resolve` command
pub fn run(config: &HostConfig, format: OutputFormat) -> Result<(), CliError> {
    let resolved = hotswap_core::resolve(&config.base_dir).map_err(hotswap_core::HostError::from)?;

    match format {
        OutputFormat::Text => println!("{resolved}"),
        OutputFormat::Json => {
            let exists = resolved.as_path().exists();
            let modified = hotswap_core::modified_time(resolved.as_path())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            println!(
                "{}",
                serde_json::json!({
                    "path": resolved.as_path(),
                    "exists": exists,
                    "modified_unix_secs": modified,
                })
            );
        }
    }
    Ok(())
}
