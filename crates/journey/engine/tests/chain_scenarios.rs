//! End-to-end chain behaviour against scripted calls.

use journey_engine::testing::ScriptedCall;
use journey_engine::{
    OutputBinding, PassPolicy, ResultAggregator, StepChain, StepDefinition, SyntheticFallback,
};
use journey_types::{keys, FailureKind, StepFailure, StepOutcome, WorkflowState};
use serde_json::json;

struct Calls {
    auth: ScriptedCall,
    wallet: ScriptedCall,
    keygen: ScriptedCall,
    sign: ScriptedCall,
    broadcast: ScriptedCall,
    balance: ScriptedCall,
}

impl Calls {
    fn new() -> Self {
        Self {
            auth: ScriptedCall::new(),
            wallet: ScriptedCall::new(),
            keygen: ScriptedCall::new(),
            sign: ScriptedCall::new(),
            broadcast: ScriptedCall::new(),
            balance: ScriptedCall::new(),
        }
    }
}

fn journey(calls: &Calls, with_fallbacks: bool) -> StepChain {
    let mut steps = vec![
        StepDefinition::new("auth", calls.auth.clone())
            .produces(OutputBinding::primary(keys::ACCESS_TOKEN))
            .produces(OutputBinding::primary(keys::USER_ID).at("/user/id")),
        StepDefinition::new("wallet", calls.wallet.clone())
            .requires([keys::ACCESS_TOKEN, keys::USER_ID])
            .produces(OutputBinding::primary(keys::WALLET_ID)),
        StepDefinition::new("keygen", calls.keygen.clone())
            .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID])
            .produces(OutputBinding::primary(keys::KEY_ID))
            .produces(OutputBinding::secondary(keys::PUBLIC_KEY)),
        StepDefinition::new("sign", calls.sign.clone())
            .requires([keys::ACCESS_TOKEN, keys::WALLET_ID, keys::KEY_ID])
            .produces(OutputBinding::primary(keys::SIGNATURE)),
        StepDefinition::new("broadcast", calls.broadcast.clone())
            .requires([keys::ACCESS_TOKEN, keys::WALLET_ID, keys::SIGNATURE])
            .produces(OutputBinding::primary(keys::TX_HASH)),
        StepDefinition::new("balance", calls.balance.clone())
            .requires([keys::ACCESS_TOKEN, keys::WALLET_ID])
            .produces(OutputBinding::secondary(keys::BALANCE)),
    ];

    if with_fallbacks {
        let synthetic = [
            vec![(keys::ACCESS_TOKEN, "mock-token"), (keys::USER_ID, "mock-user")],
            vec![(keys::WALLET_ID, "mock-wallet")],
            vec![(keys::KEY_ID, "mock-key")],
            vec![(keys::SIGNATURE, "mock-signature")],
            vec![(keys::TX_HASH, "mock-tx")],
            vec![(keys::BALANCE, "0")],
        ];
        steps = steps
            .into_iter()
            .zip(synthetic)
            .map(|(step, pairs)| step.with_fallback(SyntheticFallback::fixed(pairs)))
            .collect();
    }

    StepChain::new("journey", steps).expect("journey definition is valid")
}

#[tokio::test]
async fn auth_rejection_skips_dependents_instead_of_failing_them() {
    let calls = Calls::new();
    let calls = Calls {
        auth: calls.auth.json(401, json!({"error": "bad credential"})),
        ..calls
    };
    let chain = journey(&calls, false);

    let report = chain.run(WorkflowState::new()).await;

    match report.outcome_of("auth") {
        Some(StepOutcome::Failed { cause }) => assert_eq!(cause.kind(), FailureKind::Protocol),
        other => panic!("auth should fail, got {:?}", other),
    }
    match report.outcome_of("wallet") {
        Some(StepOutcome::Skipped { missing }) => {
            assert_eq!(
                missing,
                &vec![keys::ACCESS_TOKEN.to_string(), keys::USER_ID.to_string()]
            );
        }
        other => panic!("wallet should skip, got {:?}", other),
    }
    for step in ["keygen", "sign", "broadcast", "balance"] {
        assert!(
            report.outcome_of(step).is_some_and(StepOutcome::is_skipped),
            "{step} should skip"
        );
    }

    assert_eq!(calls.wallet.calls(), 0);
    assert_eq!(calls.balance.calls(), 0);
    assert!(report.final_state.is_empty());

    let aggregate = ResultAggregator::default().aggregate(&report);
    assert_eq!(aggregate.passed, 0);
    assert!(!aggregate.verdict);
}

#[tokio::test]
async fn every_call_failing_with_fallbacks_degrades_the_whole_journey() {
    let calls = Calls::new();
    let calls = Calls {
        auth: calls.auth.transport("connection refused"),
        wallet: calls.wallet.json(500, json!({"error": "boom"})),
        keygen: calls.keygen.text(200, "not json"),
        sign: calls.sign.json(200, json!({"unexpected": true})),
        broadcast: calls.broadcast.json(503, json!({})),
        balance: calls.balance.transport("reset by peer"),
    };
    let chain = journey(&calls, true);

    let report = chain.run(WorkflowState::new()).await;

    assert_eq!(report.records.len(), 6);
    assert!(report.records.iter().all(|r| r.outcome.is_degraded()));
    assert_eq!(report.degraded().count(), 6);

    let state = &report.final_state;
    assert_eq!(state.get_str(keys::ACCESS_TOKEN).as_deref(), Some("mock-token"));
    assert_eq!(state.get_str(keys::TX_HASH).as_deref(), Some("mock-tx"));

    // Every dependent actually ran, fed by synthetic values
    let sign_input = &calls.sign.seen()[0];
    assert_eq!(sign_input.get_str(keys::KEY_ID).as_deref(), Some("mock-key"));

    let aggregate = ResultAggregator::new(PassPolicy::strict()).aggregate(&report);
    assert_eq!(aggregate.passed, 6);
    assert_eq!(aggregate.succeeded, 0);
    assert!(aggregate.verdict);
    assert!(aggregate.relied_on_fallbacks());
}

#[tokio::test]
async fn a_mid_chain_failure_only_skips_what_depends_on_it() {
    let calls = Calls::new();
    let calls = Calls {
        auth: calls
            .auth
            .json(200, json!({"access_token": "tok", "user": {"id": "u-1"}})),
        wallet: calls.wallet.json(201, json!({"wallet_id": "w-1"})),
        keygen: calls.keygen.transport("timed out"),
        sign: calls.sign,
        broadcast: calls.broadcast,
        balance: calls.balance.json(200, json!({"balance": "0.25"})),
    };
    let chain = journey(&calls, false);

    let report = chain.run(WorkflowState::new()).await;
    let labels: Vec<&str> = report.records.iter().map(|r| r.outcome.label()).collect();

    assert_eq!(
        labels,
        vec!["success", "success", "failed", "skipped", "skipped", "success"]
    );
    assert_eq!(
        report.outcome_of("sign"),
        Some(&StepOutcome::Skipped {
            missing: vec![keys::KEY_ID.to_string()]
        })
    );
    assert_eq!(
        report.outcome_of("keygen"),
        Some(&StepOutcome::Failed {
            cause: StepFailure::transport("timed out")
        })
    );

    let aggregate = ResultAggregator::default().aggregate(&report);
    assert_eq!(aggregate.passed, 3);
    assert_eq!(aggregate.threshold, 3);
    assert!(aggregate.verdict);
}

#[tokio::test]
async fn later_steps_never_overwrite_earlier_values() {
    let calls = Calls::new();
    let calls = Calls {
        auth: calls
            .auth
            .json(200, json!({"access_token": "first", "user": {"id": "u-1"}})),
        wallet: calls.wallet.json(201, json!({"wallet_id": "w-1"})),
        keygen: calls
            .keygen
            .json(200, json!({"key_id": "k-1", "public_key": "pk"})),
        sign: calls.sign.json(200, json!({"signature": "sig"})),
        broadcast: calls.broadcast.json(200, json!({"tx_hash": "0xabc"})),
        balance: calls.balance.json(200, json!({"balance": "1"})),
    };
    let chain = journey(&calls, false);

    let report = chain
        .run(WorkflowState::new().with_value(keys::WALLET_ID, "seeded-wallet"))
        .await;

    assert_eq!(report.counts().succeeded, 6);
    assert_eq!(
        report.final_state.get_str(keys::WALLET_ID).as_deref(),
        Some("seeded-wallet")
    );
    assert_eq!(report.final_state.get_str(keys::ACCESS_TOKEN).as_deref(), Some("first"));
}
