//! Multi-phase calls such as key generation or signing sessions
//!
//! A ceremony runs its phases in order. The top-level fields of each
//! intermediate response (a session id, say) become visible to later
//! phases through a scratch copy of the state. The scratch never reaches
//! the workflow state: only the final phase's response is handed back
//! for classification.

use crate::template::RequestTemplate;
use async_trait::async_trait;
use journey_engine::{CallResponse, StepCall};
use journey_types::{StatePatch, StepFailure, WorkflowState};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// An ordered list of request templates presented as one call
#[derive(Clone, Debug)]
pub struct Ceremony {
    phases: Vec<RequestTemplate>,
    pause: Option<Duration>,
}

impl Ceremony {
    pub fn new(first: RequestTemplate) -> Self {
        Self {
            phases: vec![first],
            pause: None,
        }
    }

    pub fn then(mut self, phase: RequestTemplate) -> Self {
        self.phases.push(phase);
        self
    }

    /// Wait between phases, for services that finish work asynchronously.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn phases(&self) -> &[RequestTemplate] {
        &self.phases
    }
}

#[async_trait]
impl StepCall for Ceremony {
    async fn invoke(&self, state: &WorkflowState) -> Result<CallResponse, StepFailure> {
        let mut scratch = state.clone();
        let last = self.phases.len().saturating_sub(1);

        for (index, phase) in self.phases.iter().enumerate() {
            let response = phase.invoke(&scratch).await?;
            if index == last {
                return Ok(response);
            }

            // A failed intermediate phase ends the ceremony with its response
            if !response.is_success() {
                debug!(phase = %phase.describe(), status = response.status, "Ceremony phase rejected");
                return Ok(response);
            }

            let patch: StatePatch = match &response.body {
                Some(Value::Object(fields)) => fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                _ => StatePatch::new(),
            };
            scratch = scratch.merged(&patch).0;

            if let Some(pause) = self.pause {
                tokio::time::sleep(pause).await;
            }
        }

        Err(StepFailure::transport("ceremony has no phases"))
    }

    fn describe(&self) -> String {
        self.phases
            .iter()
            .map(|p| p.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Only the first phase reads purely from state; later phases may also
    /// read the scratch fields of earlier responses.
    fn placeholders(&self) -> Vec<String> {
        self.phases
            .first()
            .map(RequestTemplate::placeholders)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TargetClient;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn keygen(server: &MockServer) -> Ceremony {
        let client = TargetClient::new(&server.uri()).unwrap();
        Ceremony::new(
            RequestTemplate::post(&client, "/keygen/start")
                .with_body(json!({"wallet_id": "{wallet_id}"})),
        )
        .then(
            RequestTemplate::post(&client, "/keygen/complete")
                .with_body(json!({"session_id": "{session_id}"})),
        )
    }

    #[tokio::test]
    async fn test_session_flows_between_phases() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keygen/start"))
            .and(body_json(json!({"wallet_id": "w-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s-7"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/keygen/complete"))
            .and(body_json(json!({"session_id": "s-7"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key_id": "k-1", "public_key": "pk"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = WorkflowState::new().with_value("wallet_id", "w-1");
        let response = keygen(&server).await.invoke(&state).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(json!({"key_id": "k-1", "public_key": "pk"})));
    }

    #[tokio::test]
    async fn test_rejected_first_phase_stops_the_ceremony() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keygen/start"))
            .respond_with(ResponseTemplate::new(409).set_body_string("busy"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/keygen/complete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let state = WorkflowState::new().with_value("wallet_id", "w-1");
        let response = keygen(&server).await.invoke(&state).await.unwrap();

        assert_eq!(response.status, 409);
    }

    #[tokio::test]
    async fn test_missing_session_is_a_contract_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/keygen/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
            .mount(&server)
            .await;

        let state = WorkflowState::new().with_value("wallet_id", "w-1");
        let failure = keygen(&server).await.invoke(&state).await.unwrap_err();

        assert_eq!(failure, StepFailure::contract(["session_id"]));
    }

    #[tokio::test]
    async fn test_describe_lists_phases() {
        let server = MockServer::start().await;
        let ceremony = keygen(&server).await;
        assert_eq!(
            ceremony.describe(),
            "POST /keygen/start -> POST /keygen/complete"
        );
        assert_eq!(
            StepCall::placeholders(&ceremony),
            ceremony.phases()[0].placeholders()
        );
    }
}
