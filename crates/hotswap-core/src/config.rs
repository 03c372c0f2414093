//! Host configuration
//!
//! Loads [`HostConfig`] from YAML, TOML, JSON, INI, RON or JSON5 (detected
//! from the file extension), with `${VAR}` / `$VAR` substitution and
//! `HOTSWAP_*` environment overrides layered on top.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use config::{Config as Cfg, Environment, File, FileStoredFormat};
pub use config::FileFormat;
use regex::Regex;
use serde::Deserialize;

use crate::loader::LoaderOptions;

/// Prefix of environment overrides, e.g. `HOTSWAP_BASE_DIR`
pub const ENV_PREFIX: &str = "HOTSWAP";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_weight() -> f32 {
    1.0
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_partitions() -> usize {
    1
}

/// Settings the host hands to the core at startup
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostConfig {
    /// Directory the module image is looked up in
    pub base_dir: PathBuf,
    /// Weight passed with every element
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Interval between batches in watch mode
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Number of disjoint partitions dispatched concurrently
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    /// Parent directory for shadow copies of the module
    #[serde(default)]
    pub shadow_dir: Option<PathBuf>,
}

impl HostConfig {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            weight: default_weight(),
            poll_interval_ms: default_poll_interval_ms(),
            partitions: default_partitions(),
            shadow_dir: None,
        }
    }

    /// Load from a file, then apply `HOTSWAP_*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content)?;

        let config = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a string in the given format
    pub fn from_str(content: &str, format: FileFormat) -> ConfigResult<Self> {
        let substituted = substitute_env_vars(content)?;

        let config = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_shadow_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.shadow_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Reject values the host cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.weight.is_finite() {
            return Err(ConfigError::Invalid {
                field: "weight",
                reason: format!("{} is not a finite number", self.weight),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            shadow_dir: self.shadow_dir.clone(),
        }
    }
}

const FORMATS: [FileFormat; 6] = [
    FileFormat::Toml,
    FileFormat::Yaml,
    FileFormat::Json,
    FileFormat::Json5,
    FileFormat::Ron,
    FileFormat::Ini,
];

/// `${VAR}` or `$VAR`
static ENV_REFERENCE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
});

/// Format of a config file, by extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    FORMATS
        .into_iter()
        .find(|format| format.file_extensions().contains(&ext.as_str()))
        .ok_or_else(|| ConfigError::UnsupportedFormat(format!("{}", path.display())))
}

/// Expand environment references in one pass; unknown variables are kept
pub fn substitute_env_vars(content: &str) -> ConfigResult<String> {
    let re = ENV_REFERENCE
        .as_ref()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("host.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("host.yml")).unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format(Path::new("host.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(detect_format(Path::new("host.json")).unwrap(), FileFormat::Json);
        assert_eq!(detect_format(Path::new("host.ron")).unwrap(), FileFormat::Ron);
        assert!(detect_format(Path::new("host.txt")).is_err());
        assert!(detect_format(Path::new("host")).is_err());
    }

    #[test]
    fn test_from_str_defaults() {
        let config = HostConfig::from_str(r#"base_dir = "/plugins/demo""#, FileFormat::Toml).unwrap();
        assert_eq!(config, HostConfig::new("/plugins/demo"));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.loader_options().shadow_dir.is_none());
    }

    #[test]
    fn test_from_str_yaml() {
        let yaml = r#"
base_dir: /plugins/demo
weight: 0.25
poll_interval_ms: 50
partitions: 4
shadow_dir: /tmp/shadow
"#;
        let config = HostConfig::from_str(yaml, FileFormat::Yaml).unwrap();
        assert_eq!(config.weight, 0.25);
        assert_eq!(config.partitions, 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.shadow_dir, Some(PathBuf::from("/tmp/shadow")));
    }

    #[test]
    fn test_missing_base_dir() {
        let result = HostConfig::from_str(r#"{ "weight": 2.0 }"#, FileFormat::Json);
        assert!(matches!(result, Err(ConfigError::Serialization(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, r#"{ "base_dir": "/plugins/demo", "partitions": 2 }"#).unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/plugins/demo"));
        assert_eq!(config.partitions, 2);
    }

    #[test]
    fn test_substitute_keeps_unknown() {
        let content = "base_dir = \"${HOTSWAP_TEST_SURELY_UNSET_VAR}/demo\"";
        assert_eq!(substitute_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_substitute_known_var() {
        // PATH is set in every test environment
        let path = std::env::var("PATH").unwrap();
        assert_eq!(substitute_env_vars("${PATH}").unwrap(), path);
        assert_eq!(substitute_env_vars("$PATH").unwrap(), path);
    }

    #[test]
    fn test_detect_format_case_insensitive() {
        assert_eq!(detect_format(Path::new("HOST.JSON5")).unwrap(), FileFormat::Json5);
        assert_eq!(detect_format(Path::new("host.ini")).unwrap(), FileFormat::Ini);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = HostConfig::from_str(
            "base_dir = \"/plugins/demo\"\npoll_interval_ms = 0\n",
            FileFormat::Toml,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "poll_interval_ms", .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, r#"{ "base_dir": "/plugins/demo", "poll_interval_ms": 0 }"#).unwrap();
        assert!(matches!(HostConfig::load(&path), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate() {
        assert!(HostConfig::new("/plugins").validate().is_ok());
        let zero = HostConfig::new("/plugins").with_poll_interval(Duration::ZERO);
        assert!(zero.validate().is_err());
        let nan = HostConfig::new("/plugins").with_weight(f32::NAN);
        assert!(nan.validate().is_err());
    }
}
