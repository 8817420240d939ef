//! Error types for journey construction and run gating

/// Errors that stop a journey from being built or from running at all.
///
/// Per-step remote failures are not errors; they are recorded as
/// [`crate::StepOutcome`]s.
#[derive(Debug, thiserror::Error)]
pub enum JourneyError {
    #[error("Journey must declare at least one step")]
    EmptyJourney,

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Invalid step definition '{step}': {reason}")]
    InvalidDefinition { step: String, reason: String },

    #[error("Service {resource} not ready after {attempts} attempts")]
    ServiceUnavailable { resource: String, attempts: u32 },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl JourneyError {
    pub fn invalid(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the availability gate.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, JourneyError::ServiceUnavailable { .. })
    }
}

/// Result type alias for journey operations
pub type JourneyResult<T> = Result<T, JourneyError>;
