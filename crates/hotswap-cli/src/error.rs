use hotswap_core::{ConfigError, DispatchError, HostError};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigError(e.to_string())
    }
}
