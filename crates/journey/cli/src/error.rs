//! CLI error types

use journey_client::ClientError;
use journey_probe::ProbeError;
use journey_types::JourneyError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Journey could not be built or gated
    #[error(transparent)]
    Journey(#[from] JourneyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        CliError::Journey(err.into())
    }
}

impl From<ProbeError> for CliError {
    fn from(err: ProbeError) -> Self {
        CliError::Journey(err.into())
    }
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Journey(err) if err.is_unavailable() => 2,
            _ => 1,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
