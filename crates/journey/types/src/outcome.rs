//! Step outcomes and the failure taxonomy
//!
//! Every step in a journey ends in exactly one [`StepOutcome`]. Remote
//! failures are classified into a [`StepFailure`]; whether that failure
//! becomes `Degraded` or `Failed` depends on the step having a synthetic
//! fallback. Missing prerequisites are never failures: they are `Skipped`.

use crate::StatePatch;
use serde::{Deserialize, Serialize};

// ── Failure taxonomy ─────────────────────────────────────────────────

/// Why a remote call did not produce a usable result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// Connection refused, DNS failure, timeout
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The service answered with a non-2xx status
    #[error("protocol error: HTTP {status}")]
    Protocol {
        status: u16,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        body: String,
    },

    /// 2xx, but the body did not carry the expected fields
    #[error("contract error: missing {}", .missing.join(", "))]
    Contract { missing: Vec<String> },
}

impl StepFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(status: u16, body: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            body: body.into(),
        }
    }

    pub fn contract<S: Into<String>>(missing: impl IntoIterator<Item = S>) -> Self {
        Self::Contract {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            StepFailure::Transport { .. } => FailureKind::Transport,
            StepFailure::Protocol { .. } => FailureKind::Protocol,
            StepFailure::Contract { .. } => FailureKind::Contract,
        }
    }

    /// Short form used in tables: the HTTP status or the error class.
    pub fn short(&self) -> String {
        match self {
            StepFailure::Transport { .. } => "transport".to_string(),
            StepFailure::Protocol { status, .. } => format!("HTTP {}", status),
            StepFailure::Contract { .. } => "contract".to_string(),
        }
    }
}

/// Coarse class of a [`StepFailure`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Protocol,
    Contract,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Protocol => write!(f, "protocol"),
            FailureKind::Contract => write!(f, "contract"),
        }
    }
}

// ── Outcome ──────────────────────────────────────────────────────────

/// Result of executing one step. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The remote call succeeded and every primary output was extracted
    Success { payload: StatePatch },

    /// The remote call failed; synthetic values were merged instead
    Degraded {
        payload: StatePatch,
        reason: StepFailure,
    },

    /// Prerequisite state was missing, so the step was not attempted
    Skipped { missing: Vec<String> },

    /// The remote call failed and the step has no fallback
    Failed { cause: StepFailure },
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Success { .. } => "success",
            StepOutcome::Degraded { .. } => "degraded",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::Failed { .. } => "failed",
        }
    }

    /// Success and Degraded both mean "attempted and not hard-failed".
    pub fn counts_as_passed(&self) -> bool {
        matches!(
            self,
            StepOutcome::Success { .. } | StepOutcome::Degraded { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StepOutcome::Degraded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    /// Values merged into the workflow state by this outcome, if any.
    pub fn payload(&self) -> Option<&StatePatch> {
        match self {
            StepOutcome::Success { payload } | StepOutcome::Degraded { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }

    /// One-line human description of why the step did not fully succeed.
    pub fn detail(&self) -> Option<String> {
        match self {
            StepOutcome::Success { .. } => None,
            StepOutcome::Degraded { reason, .. } => Some(format!("synthetic values ({})", reason)),
            StepOutcome::Skipped { missing } => Some(format!("missing {}", missing.join(", "))),
            StepOutcome::Failed { cause } => Some(cause.to_string()),
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_passed_classification() {
        let degraded = StepOutcome::Degraded {
            payload: StatePatch::new(),
            reason: StepFailure::protocol(503, ""),
        };
        assert!(StepOutcome::Success {
            payload: StatePatch::new()
        }
        .counts_as_passed());
        assert!(degraded.counts_as_passed());
        assert!(!StepOutcome::Skipped { missing: vec![] }.counts_as_passed());
        assert!(!StepOutcome::Failed {
            cause: StepFailure::transport("refused")
        }
        .counts_as_passed());
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(StepFailure::transport("x").kind(), FailureKind::Transport);
        assert_eq!(StepFailure::protocol(500, "").kind(), FailureKind::Protocol);
        assert_eq!(
            StepFailure::contract(["wallet_id"]).kind(),
            FailureKind::Contract
        );
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            StepFailure::contract(["key_id", "public_key"]).to_string(),
            "contract error: missing key_id, public_key"
        );
        assert_eq!(StepFailure::protocol(404, "nope").short(), "HTTP 404");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = StepOutcome::Failed {
            cause: StepFailure::protocol(502, ""),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"outcome": "failed", "cause": {"kind": "protocol", "status": 502}})
        );
    }

    #[test]
    fn test_detail_mentions_missing_keys() {
        let outcome = StepOutcome::Skipped {
            missing: vec!["access_token".into(), "user_id".into()],
        };
        assert_eq!(
            outcome.detail().as_deref(),
            Some("missing access_token, user_id")
        );
    }
}
