//! Pretest cleanup: best-effort removal of a previous run's identity
//!
//! Cleanup never blocks a run. Every outcome, including an unreachable
//! service, lets the journey proceed; only the log level differs.

use crate::client::TargetClient;
use crate::template::encode_segment;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the cleanup call observed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// The identity existed and was removed
    Removed,
    /// Nothing to remove
    NotFound,
    /// The service answered with an unexpected status
    Rejected { status: u16 },
    /// No response at all
    Unreachable { reason: String },
}

impl CleanupOutcome {
    /// Whether the service answered. Every outcome is non-fatal.
    pub fn acknowledged(&self) -> bool {
        !matches!(self, CleanupOutcome::Unreachable { .. })
    }
}

impl std::fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupOutcome::Removed => write!(f, "removed"),
            CleanupOutcome::NotFound => write!(f, "nothing to remove"),
            CleanupOutcome::Rejected { status } => write!(f, "rejected with status {}", status),
            CleanupOutcome::Unreachable { reason } => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Deletes a test identity before a run
#[derive(Clone, Debug)]
pub struct PretestCleanup {
    client: TargetClient,
    path: String,
}

impl PretestCleanup {
    /// `path` may contain `{identity}`, replaced by the percent-encoded
    /// identity on each run.
    pub fn new(client: &TargetClient, path: impl Into<String>) -> Self {
        Self {
            client: client.clone(),
            path: path.into(),
        }
    }

    pub async fn run(&self, identity: &str) -> CleanupOutcome {
        let path = self.path.replace("{identity}", &encode_segment(identity));

        let outcome = match self.client.delete(&path).await {
            Ok(response) if response.is_success() => CleanupOutcome::Removed,
            Ok(response) if response.status == 404 => CleanupOutcome::NotFound,
            Ok(response) => CleanupOutcome::Rejected {
                status: response.status,
            },
            Err(e) => CleanupOutcome::Unreachable {
                reason: e.to_string(),
            },
        };

        match &outcome {
            CleanupOutcome::Removed | CleanupOutcome::NotFound => {
                info!(identity, path = %path, outcome = %outcome, "Pretest cleanup done");
            }
            _ => {
                warn!(identity, path = %path, outcome = %outcome, "Pretest cleanup incomplete, continuing");
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_unacknowledged() {
        assert!(CleanupOutcome::Removed.acknowledged());
        assert!(CleanupOutcome::NotFound.acknowledged());
        assert!(CleanupOutcome::Rejected { status: 500 }.acknowledged());
        assert!(!CleanupOutcome::Unreachable {
            reason: "refused".into()
        }
        .acknowledged());
    }

    #[tokio::test]
    async fn test_identity_is_encoded_into_the_path() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/team%2Fqa%20user"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = TargetClient::new(&server.uri()).unwrap();
        let outcome = PretestCleanup::new(&client, "/users/{identity}")
            .run("team/qa user")
            .await;
        assert_eq!(outcome, CleanupOutcome::Removed);
    }

    #[tokio::test]
    async fn test_unreachable_service_does_not_error() {
        let client = TargetClient::new("http://127.0.0.1:9").unwrap();
        let outcome = PretestCleanup::new(&client, "/users/{identity}")
            .run("testuser@example.com")
            .await;
        assert!(matches!(outcome, CleanupOutcome::Unreachable { .. }));
    }
}
