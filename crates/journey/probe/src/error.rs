//! Error types for journey-probe.

use journey_types::JourneyError;
use thiserror::Error;

/// Errors raised while setting up or running the availability gate.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The readiness URL could not be parsed.
    #[error("invalid readiness url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    /// A resource never became ready.
    #[error("{resource} not ready after {attempts} attempts")]
    Exhausted { resource: String, attempts: u32 },
}

/// Result type for availability gate operations.
pub type GateResult<T> = Result<T, ProbeError>;

impl From<ProbeError> for JourneyError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Exhausted { resource, attempts } => {
                JourneyError::ServiceUnavailable { resource, attempts }
            }
            other => JourneyError::Configuration(other.to_string()),
        }
    }
}
