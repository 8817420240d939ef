//! Step Chain: an ordered, strictly sequential pipeline of steps
//!
//! The chain:
//! 1. Validates its definitions once, at construction
//! 2. Threads an immutable state snapshot from step to step
//! 3. Records every outcome in declared order
//!
//! The chain never aborts early. A failed or skipped step leaves the
//! state unchanged, so dependents skip through their own preconditions.

use crate::{StepDefinition, StepExecutor};
use chrono::Utc;
use journey_types::{JourneyError, JourneyResult, RunReport, StepRecord, WorkflowState};
use std::collections::HashSet;
use std::time::Instant;

/// Progress hooks invoked while a chain runs
pub trait ChainObserver: Send + Sync {
    fn step_started(&self, _index: usize, _step: &StepDefinition) {}

    fn step_finished(&self, _index: usize, _record: &StepRecord) {}
}

/// Observer that ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ChainObserver for NoopObserver {}

/// A named, validated sequence of step definitions
#[derive(Clone, Debug)]
pub struct StepChain {
    name: String,
    steps: Vec<StepDefinition>,
    seed_keys: Vec<String>,
    executor: StepExecutor,
}

impl StepChain {
    /// Build a chain whose first steps need nothing from the seed state.
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> JourneyResult<Self> {
        Self::with_seed_keys(name, steps, Vec::<String>::new())
    }

    /// Build a chain that may rely on `seed_keys` being supplied at run time.
    pub fn with_seed_keys<S: Into<String>>(
        name: impl Into<String>,
        steps: Vec<StepDefinition>,
        seed_keys: impl IntoIterator<Item = S>,
    ) -> JourneyResult<Self> {
        let seed_keys: Vec<String> = seed_keys.into_iter().map(Into::into).collect();
        validate(&steps, &seed_keys)?;
        Ok(Self {
            name: name.into(),
            steps,
            seed_keys,
            executor: StepExecutor::new(),
        })
    }

    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn seed_keys(&self) -> &[String] {
        &self.seed_keys
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order starting from `seed`.
    pub async fn run(&self, seed: WorkflowState) -> RunReport {
        self.run_observed(seed, &NoopObserver).await
    }

    /// Run every step in order, notifying `observer` around each one.
    pub async fn run_observed(
        &self,
        seed: WorkflowState,
        observer: &dyn ChainObserver,
    ) -> RunReport {
        let mut report = RunReport::new(&self.name, self.steps.len());
        let mut state = seed;

        tracing::info!(
            run_id = %report.run_id,
            journey = %self.name,
            steps = self.steps.len(),
            "Journey started"
        );

        for (index, step) in self.steps.iter().enumerate() {
            observer.step_started(index, step);

            let started_at = Utc::now();
            let clock = Instant::now();
            let (next, outcome) = self.executor.execute(step, &state).await;
            let elapsed_ms = clock.elapsed().as_millis() as u64;

            match outcome.detail() {
                Some(detail) if outcome.is_failed() || outcome.is_degraded() => {
                    tracing::warn!(
                        step = %step.name,
                        outcome = outcome.label(),
                        detail = %detail,
                        elapsed_ms,
                        "Step finished"
                    );
                }
                detail => {
                    tracing::info!(
                        step = %step.name,
                        outcome = outcome.label(),
                        detail = detail.as_deref().unwrap_or(""),
                        elapsed_ms,
                        "Step finished"
                    );
                }
            }

            let record = StepRecord {
                step: step.name.clone(),
                outcome,
                started_at,
                elapsed_ms,
            };
            observer.step_finished(index, &record);
            report.record(record);
            state = next;

            if let Some(pause) = step.pause_after.filter(|_| index + 1 < self.steps.len()) {
                tokio::time::sleep(pause).await;
            }
        }

        report.finish(state);

        let counts = report.counts();
        tracing::info!(
            run_id = %report.run_id,
            journey = %self.name,
            succeeded = counts.succeeded,
            degraded = counts.degraded,
            skipped = counts.skipped,
            failed = counts.failed,
            "Journey finished"
        );

        report
    }
}

fn validate(steps: &[StepDefinition], seed_keys: &[String]) -> JourneyResult<()> {
    if steps.is_empty() {
        return Err(JourneyError::EmptyJourney);
    }

    let mut names = HashSet::new();
    let mut available: HashSet<&str> = seed_keys.iter().map(String::as_str).collect();

    for step in steps {
        if step.name.trim().is_empty() {
            return Err(JourneyError::invalid(&step.name, "step name must not be blank"));
        }
        if !names.insert(step.name.as_str()) {
            return Err(JourneyError::DuplicateStep(step.name.clone()));
        }

        if let Some(key) = step.requires.iter().find(|k| !available.contains(k.as_str())) {
            return Err(JourneyError::invalid(
                &step.name,
                format!("requires '{}' which no earlier step produces", key),
            ));
        }

        if let Some(key) = step
            .placeholders()
            .into_iter()
            .find(|k| !step.requires.contains(k))
        {
            return Err(JourneyError::invalid(
                &step.name,
                format!("request reads '{}' which the step does not require", key),
            ));
        }

        let alternate_outputs = step.alternate.iter().flat_map(|a| a.outputs.iter());
        if let Some(binding) = step
            .outputs
            .iter()
            .chain(alternate_outputs)
            .find(|b| !b.pointer.starts_with('/'))
        {
            return Err(JourneyError::invalid(
                &step.name,
                format!("output '{}' has invalid pointer '{}'", binding.key, binding.pointer),
            ));
        }

        available.extend(step.output_keys());
    }

    Ok(())
}
