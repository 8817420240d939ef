//! Client error types

use journey_types::{JourneyError, StepFailure};
use thiserror::Error;

/// Errors building or using the target client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base URL or resolved path is not a valid URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Template could not be rendered
    #[error("Unresolved placeholders: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for StepFailure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unresolved(missing) => StepFailure::contract(missing),
            other => StepFailure::transport(other.to_string()),
        }
    }
}

impl From<ClientError> for JourneyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unresolved(missing) => JourneyError::Template(missing.join(", ")),
            other => JourneyError::Configuration(other.to_string()),
        }
    }
}
