//! Run reports: the ordered record of what every step did
//!
//! A report is built by the step chain while it runs and is never
//! reordered: record order equals declared chain order.

use crate::{StepOutcome, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Run Identifier ───────────────────────────────────────────────────

/// Unique identifier for one journey run
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Step Record ──────────────────────────────────────────────────────

/// One (step name, outcome) entry of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Per-outcome tallies of a report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Steps that succeeded against the real service
    pub succeeded: usize,
    pub degraded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn attempted_ok(&self) -> usize {
        self.succeeded + self.degraded
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.degraded + self.skipped + self.failed
    }
}

// ── Run Report ───────────────────────────────────────────────────────

/// Ordered outcome of a whole journey run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub journey: String,
    /// Number of steps the chain declares, executed or not
    pub declared_steps: usize,
    pub records: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// State snapshot after the last step
    pub final_state: WorkflowState,
}

impl RunReport {
    pub fn new(journey: impl Into<String>, declared_steps: usize) -> Self {
        Self {
            run_id: RunId::generate(),
            journey: journey.into(),
            declared_steps,
            records: Vec::with_capacity(declared_steps),
            started_at: Utc::now(),
            finished_at: None,
            final_state: WorkflowState::new(),
        }
    }

    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn finish(&mut self, final_state: WorkflowState) {
        self.final_state = final_state;
        self.finished_at = Some(Utc::now());
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.records
            .iter()
            .fold(OutcomeCounts::default(), |mut counts, record| {
                match record.outcome {
                    StepOutcome::Success { .. } => counts.succeeded += 1,
                    StepOutcome::Degraded { .. } => counts.degraded += 1,
                    StepOutcome::Skipped { .. } => counts.skipped += 1,
                    StepOutcome::Failed { .. } => counts.failed += 1,
                }
                counts
            })
    }

    pub fn outcome_of(&self, step: &str) -> Option<&StepOutcome> {
        self.records
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }

    /// Records whose outcome used synthetic values.
    pub fn degraded(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(|r| r.outcome.is_degraded())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.step.as_str()).collect()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
