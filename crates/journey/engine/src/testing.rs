//! Scripted calls for exercising chains without a live service.
//!
//! Available to this crate's tests and, with the `test-utils` feature, to
//! downstream crates.

use crate::{CallResponse, StepCall};
use async_trait::async_trait;
use journey_types::{StepFailure, WorkflowState};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
enum Reply {
    Respond(Result<CallResponse, StepFailure>),
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    last: Option<Reply>,
    seen: Vec<WorkflowState>,
}

/// A [`StepCall`] that replays queued replies in order.
///
/// Once the queue is drained the last reply repeats. An empty script
/// answers with a transport error. Clones share the same script, so a
/// test can keep a handle to inspect calls after moving one into a step.
#[derive(Clone, Debug, Default)]
pub struct ScriptedCall {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 2xx-or-not JSON reply.
    pub fn json(self, status: u16, body: Value) -> Self {
        self.push(Reply::Respond(Ok(CallResponse::json(status, body))))
    }

    /// Queue a reply with a raw text body.
    pub fn text(self, status: u16, body: &str) -> Self {
        self.push(Reply::Respond(Ok(CallResponse::text(status, body))))
    }

    /// Queue a transport failure.
    pub fn transport(self, message: &str) -> Self {
        self.push(Reply::Respond(Err(StepFailure::transport(message))))
    }

    /// Queue a call that never completes.
    pub fn hang(self) -> Self {
        self.push(Reply::Hang)
    }

    fn push(self, reply: Reply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.replies.push_back(reply);
        }
        self
    }

    /// Number of times the call was invoked.
    pub fn calls(&self) -> usize {
        self.script.lock().map(|s| s.seen.len()).unwrap_or(0)
    }

    /// The states the call was invoked with, in order.
    pub fn seen(&self) -> Vec<WorkflowState> {
        self.script
            .lock()
            .map(|s| s.seen.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, state: &WorkflowState) -> Reply {
        let mut script = match self.script.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.seen.push(state.clone());
        match script.replies.pop_front() {
            Some(reply) => {
                script.last = Some(reply.clone());
                reply
            }
            None => script
                .last
                .clone()
                .unwrap_or_else(|| Reply::Respond(Err(StepFailure::transport("no scripted reply")))),
        }
    }
}

#[async_trait]
impl StepCall for ScriptedCall {
    async fn invoke(&self, state: &WorkflowState) -> Result<CallResponse, StepFailure> {
        match self.next_reply(state) {
            Reply::Respond(result) => result,
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Err(StepFailure::transport("hung call resumed"))
            }
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
