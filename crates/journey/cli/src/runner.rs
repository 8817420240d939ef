//! One journey run: cleanup, availability gate, chain, verdict.

use crate::error::CliResult;
use crate::journeys::JourneyPlan;
use crate::output::Progress;
use journey_client::CleanupOutcome;
use journey_engine::{Aggregate, ResultAggregator};
use journey_probe::{AvailabilityProber, ProbeConfig, ProbeError, Readiness};
use journey_types::RunReport;
use serde::Serialize;

/// Everything a finished run produced
#[derive(Debug, Serialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupOutcome>,
    pub readiness: Vec<Readiness>,
    pub report: RunReport,
    pub aggregate: Aggregate,
    /// Wall time of the chain alone
    pub duration_ms: Option<i64>,
}

/// Execute `plan`. Gate exhaustion is the only error once the plan exists.
pub async fn run(
    plan: &JourneyPlan,
    probe: Option<ProbeConfig>,
    identity: &str,
    progress: &Progress,
) -> CliResult<RunSummary> {
    let cleanup = match &plan.cleanup {
        Some(cleanup) => {
            let outcome = cleanup.run(identity).await;
            progress.cleanup(identity, &outcome);
            Some(outcome)
        }
        None => None,
    };

    let readiness = match probe {
        Some(config) if !plan.readiness.is_empty() => gate(plan, config, progress).await?,
        _ => Vec::new(),
    };

    let report = plan.chain.run_observed(plan.seed.clone(), progress).await;
    let aggregate = ResultAggregator::new(plan.policy).aggregate(&report);
    let duration_ms = report.duration_ms();
    tracing::info!(
        journey = %plan.kind,
        run_id = %report.run_id,
        passed = aggregate.passed,
        degraded = aggregate.degraded,
        threshold = aggregate.threshold,
        verdict = aggregate.verdict,
        duration_ms = duration_ms.unwrap_or_default(),
        "Journey finished"
    );

    Ok(RunSummary {
        cleanup,
        readiness,
        report,
        aggregate,
        duration_ms,
    })
}

async fn gate(
    plan: &JourneyPlan,
    config: ProbeConfig,
    progress: &Progress,
) -> Result<Vec<Readiness>, ProbeError> {
    let resources = plan.gate_resources();
    let worst_case = config.worst_case_wait();
    tracing::debug!(
        resources = ?resources,
        worst_case_secs = worst_case.as_secs(),
        "Waiting for services"
    );
    progress.gate(&resources, worst_case);
    let prober = AvailabilityProber::new(config);
    let listener = progress.listen(prober.subscribe());

    let result = prober.wait_until_all_ready(&plan.readiness).await;

    // Closing the channel ends the listener
    drop(prober);
    if let Some(handle) = listener {
        let _ = handle.await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journeys::JourneyKind;
    use crate::output::OutputFormat;
    use journey_client::{PretestCleanup, TargetClient};
    use journey_engine::testing::ScriptedCall;
    use journey_engine::{OutputBinding, PassPolicy, StepChain, StepDefinition};
    use journey_types::{keys, WorkflowState};
    use serde_json::json;

    fn plan(cleanup: PretestCleanup, auth: ScriptedCall) -> JourneyPlan {
        let steps = vec![
            StepDefinition::new("auth", auth)
                .produces(OutputBinding::primary(keys::ACCESS_TOKEN))
                .produces(OutputBinding::primary(keys::USER_ID)),
            StepDefinition::new(
                "wallet",
                ScriptedCall::new().json(201, json!({"wallet_id": "w-1"})),
            )
            .requires([keys::ACCESS_TOKEN, keys::USER_ID])
            .produces(OutputBinding::primary(keys::WALLET_ID)),
        ];
        JourneyPlan {
            kind: JourneyKind::Legacy,
            chain: StepChain::new("legacy", steps).unwrap(),
            seed: WorkflowState::new(),
            readiness: Vec::new(),
            cleanup: Some(cleanup),
            policy: PassPolicy::new(1.0),
        }
    }

    #[tokio::test]
    async fn test_unreachable_cleanup_does_not_stop_the_chain() {
        let client = TargetClient::new("http://127.0.0.1:9").unwrap();
        let auth = ScriptedCall::new().json(200, json!({"access_token": "t", "user_id": "u"}));
        let plan = plan(PretestCleanup::new(&client, "/users/{identity}"), auth.clone());

        let summary = run(&plan, None, "testuser@example.com", &Progress::new(OutputFormat::Json))
            .await
            .unwrap();

        assert!(matches!(
            summary.cleanup,
            Some(CleanupOutcome::Unreachable { .. })
        ));
        assert_eq!(auth.calls(), 1);
        assert_eq!(summary.report.records.len(), 2);
        assert_eq!(summary.aggregate.succeeded, 2);
        assert!(summary.aggregate.verdict);
        assert!(summary.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_seed_reaches_the_first_step() {
        let client = TargetClient::new("http://127.0.0.1:9").unwrap();
        let auth = ScriptedCall::new().json(200, json!({"access_token": "t", "user_id": "u"}));
        let mut plan = plan(PretestCleanup::new(&client, "/users/{identity}"), auth.clone());
        plan.cleanup = None;
        plan.seed = WorkflowState::new().with_value("email", "seeded@example.com");

        let summary = run(&plan, None, "unused", &Progress::new(OutputFormat::Json))
            .await
            .unwrap();

        assert!(summary.cleanup.is_none());
        assert_eq!(auth.seen()[0].get_str("email").as_deref(), Some("seeded@example.com"));
    }
}
