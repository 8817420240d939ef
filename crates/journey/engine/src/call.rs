//! The remote-call seam of a step
//!
//! The engine never speaks HTTP itself. A step owns a [`StepCall`] that
//! turns the current workflow state into one remote interaction and hands
//! back the raw response; classification happens in the executor.

use async_trait::async_trait;
use journey_types::{StepFailure, WorkflowState};
use serde_json::Value;

/// Maximum number of body characters kept for protocol errors.
const RAW_BODY_LIMIT: usize = 256;

/// Raw response of a remote call
#[derive(Clone, Debug, PartialEq)]
pub struct CallResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed JSON body, `None` when empty or not JSON
    pub body: Option<Value>,
    /// Raw body text, truncated
    pub raw: String,
}

impl CallResponse {
    /// Build a response from a status and a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        let raw = truncate(&body.to_string());
        Self {
            status,
            body: Some(body),
            raw,
        }
    }

    /// Build a response from raw text, parsing it as JSON when possible.
    pub fn text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(text).ok()
        };
        Self {
            status,
            body,
            raw: truncate(text),
        }
    }

    /// A response with no body at all.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            raw: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= RAW_BODY_LIMIT {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(RAW_BODY_LIMIT).collect();
        cut.push('…');
        cut
    }
}

/// One remote operation against the target endpoint set.
///
/// Implementations build their request only from `state` and fixed
/// fixtures, and report transport problems as [`StepFailure::Transport`].
/// They must not classify HTTP statuses; the executor does that.
#[async_trait]
pub trait StepCall: Send + Sync {
    /// Perform the call.
    async fn invoke(&self, state: &WorkflowState) -> Result<CallResponse, StepFailure>;

    /// Short description for logs, e.g. `POST /api/v1/wallets`.
    fn describe(&self) -> String;

    /// State keys the call reads. Empty when the call cannot tell.
    fn placeholders(&self) -> Vec<String> {
        Vec::new()
    }
}
