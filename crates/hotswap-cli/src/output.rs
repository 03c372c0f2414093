//! Output formatting

use crate::CliError;
use hotswap_core::{ReloadStats, Vec3};
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for automation
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// One transformed batch
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub iteration: Option<u64>,
    pub weight: f32,
    pub points: &'a [Vec3],
    pub stats: ReloadStats,
}

impl BatchReport<'_> {
    /// Render the report in the given format
    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string(self)?),
            OutputFormat::Text => {
                let mut lines = Vec::with_capacity(self.points.len() + 1);
                if let Some(iteration) = self.iteration {
                    lines.push(format!(
                        "batch {iteration} (loads: {}, reloads: {})",
                        self.stats.loads, self.stats.reloads
                    ));
                }
                lines.extend(self.points.iter().map(ToString::to_string));
                Ok(lines.join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text() {
        let points = [Vec3::new(2.0, 4.0, 6.0)];
        let report = BatchReport {
            iteration: None,
            weight: 1.0,
            points: &points,
            stats: ReloadStats::default(),
        };
        assert_eq!(report.render(OutputFormat::Text).unwrap(), points[0].to_string());
    }

    #[test]
    fn test_render_json() {
        let points = [Vec3::new(2.0, 4.0, 6.0)];
        let report = BatchReport {
            iteration: Some(3),
            weight: 0.5,
            points: &points,
            stats: ReloadStats::default(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["iteration"], 3);
        assert_eq!(value["weight"], 0.5);
        assert_eq!(value["points"][0]["y"], 4.0);
        assert_eq!(value["stats"]["loads"], 0);
    }
}
