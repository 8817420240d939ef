//! Step executor: run one step against a state snapshot
//!
//! The executor owns the classification rules:
//!
//! 1. Unmet preconditions → `Skipped`, state unchanged, no call made.
//! 2. The call runs under a timeout; expiry is a transport error.
//! 3. 2xx with every primary output → `Success`, outputs merged.
//! 4. Otherwise the alternate route, when declared, gets one try.
//! 5. Anything else → `Degraded` when a fallback exists (synthetic values
//!    merged), `Failed` otherwise (state unchanged).

use crate::{CallResponse, OutputBinding, StepCall, StepDefinition};
use journey_types::{StatePatch, StepFailure, StepOutcome, WorkflowState};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout applied when a step does not declare its own.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes single steps; holds no per-run state
#[derive(Clone, Debug)]
pub struct StepExecutor {
    default_timeout: Duration,
}

impl StepExecutor {
    pub fn new() -> Self {
        Self {
            default_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute `step` against `state`, returning the next snapshot and the
    /// outcome. Never panics and never returns an error: every failure mode
    /// is an outcome.
    pub async fn execute(
        &self,
        step: &StepDefinition,
        state: &WorkflowState,
    ) -> (WorkflowState, StepOutcome) {
        let missing = state.missing(&step.requires);
        if !missing.is_empty() {
            debug!(step = %step.name, missing = ?missing, "Prerequisites missing, skipping");
            return (state.clone(), StepOutcome::Skipped { missing });
        }

        let failure = match self.attempt(step, step.call.as_ref(), &step.outputs, state).await {
            Ok(payload) => return succeed(step, state, payload),
            Err(failure) => failure,
        };

        if let Some(alternate) = &step.alternate {
            debug!(step = %step.name, cause = %failure, "Trying alternate route");
            match self
                .attempt(step, alternate.call.as_ref(), &alternate.outputs, state)
                .await
            {
                Ok(payload) => return self.complete_alternate(step, state, payload),
                Err(second) => warn!(
                    step = %step.name,
                    route = %alternate.call.describe(),
                    cause = %second,
                    "Alternate route failed as well"
                ),
            }
        }

        self.degrade_or_fail(step, state, StatePatch::new(), failure)
    }

    /// One call under the step's timeout, classified against `outputs`.
    async fn attempt(
        &self,
        step: &StepDefinition,
        call: &dyn StepCall,
        outputs: &[OutputBinding],
        state: &WorkflowState,
    ) -> Result<StatePatch, StepFailure> {
        let timeout = step.timeout.unwrap_or(self.default_timeout);
        let response = match tokio::time::timeout(timeout, call.invoke(state)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(StepFailure::transport(format!(
                    "{} timed out after {}ms",
                    call.describe(),
                    timeout.as_millis()
                )))
            }
        };
        extract_outputs(outputs, &response)
    }

    /// The alternate answered; any primary key it did not carry comes from
    /// the fallback.
    fn complete_alternate(
        &self,
        step: &StepDefinition,
        state: &WorkflowState,
        payload: StatePatch,
    ) -> (WorkflowState, StepOutcome) {
        let (next, _) = state.merged(&payload);
        let uncovered = next.missing(&step.primary_keys());
        if uncovered.is_empty() {
            return succeed(step, state, payload);
        }
        self.degrade_or_fail(step, state, payload, StepFailure::contract(uncovered))
    }

    /// Fill `base` from the fallback. Values already in `base` win.
    fn degrade_or_fail(
        &self,
        step: &StepDefinition,
        state: &WorkflowState,
        base: StatePatch,
        failure: StepFailure,
    ) -> (WorkflowState, StepOutcome) {
        let Some(fallback) = &step.fallback else {
            return (state.clone(), StepOutcome::Failed { cause: failure });
        };

        let mut payload = base;
        for (key, value) in fallback.generate(state) {
            payload.entry(key).or_insert(value);
        }
        let (next, _) = state.merged(&payload);

        let uncovered = next.missing(&step.primary_keys());
        if !uncovered.is_empty() {
            warn!(
                step = %step.name,
                uncovered = ?uncovered,
                "Synthetic fallback does not cover every primary output"
            );
            return (state.clone(), StepOutcome::Failed { cause: failure });
        }

        (
            next,
            StepOutcome::Degraded {
                payload,
                reason: failure,
            },
        )
    }
}

fn succeed(
    step: &StepDefinition,
    state: &WorkflowState,
    payload: StatePatch,
) -> (WorkflowState, StepOutcome) {
    let (next, ignored) = state.merged(&payload);
    if !ignored.is_empty() {
        warn!(
            step = %step.name,
            keys = ?ignored,
            "Response tried to overwrite existing state; kept earlier values"
        );
    }
    (next, StepOutcome::Success { payload })
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a raw response and pull the declared outputs out of it.
fn extract_outputs(
    outputs: &[OutputBinding],
    response: &CallResponse,
) -> Result<StatePatch, StepFailure> {
    if !response.is_success() {
        return Err(StepFailure::protocol(response.status, response.raw.clone()));
    }

    if outputs.is_empty() {
        return Ok(StatePatch::new());
    }

    let Some(body) = &response.body else {
        // 2xx but nothing parseable to read outputs from
        let primary: Vec<&str> = outputs
            .iter()
            .filter(|b| b.primary)
            .map(|b| b.key.as_str())
            .collect();
        let missing: Vec<&str> = if primary.is_empty() {
            outputs.iter().map(|b| b.key.as_str()).collect()
        } else {
            primary
        };
        return Err(StepFailure::contract(missing));
    };

    let mut payload = StatePatch::new();
    let mut missing = Vec::new();

    for binding in outputs {
        match body.pointer(&binding.pointer).filter(|v| binding.accepts(v)) {
            Some(value) => {
                payload.insert(binding.key.clone(), normalize(value));
            }
            None if binding.primary => missing.push(binding.key.clone()),
            None => {}
        }
    }

    if missing.is_empty() {
        Ok(payload)
    } else {
        Err(StepFailure::contract(missing))
    }
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}
