//! Journey catalog
//!
//! Every variant is the same parameterised chain machinery fed with a
//! different declarative step list:
//!
//! - `legacy`: user-scoped routes, no fallbacks, half the steps must pass
//! - `gateway`: `/api/v1` routes with two-phase key generation and
//!   signing, synthetic fallbacks on every step
//! - `connectivity`: independent reachability checks, all must pass
//! - `onboarding`: a freshly generated user registers, gets a wallet and
//!   a key, then signs and broadcasts; every step must pass

use crate::config::HarnessConfig;
use crate::error::CliResult;
use journey_client::{Ceremony, PretestCleanup, RequestTemplate, TargetClient};
use journey_engine::{
    OutputBinding, PassPolicy, StepChain, StepDefinition, StepExecutor, SyntheticFallback,
};
use journey_probe::{HttpReadiness, ReadinessCheck};
use journey_types::{keys, StatePatch, WorkflowState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Known journeys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum JourneyKind {
    /// User-scoped routes of the first backend API
    Legacy,
    /// Versioned gateway routes with synthetic fallbacks
    Gateway,
    /// Service reachability only
    Connectivity,
    /// Registration of a generated user through to broadcast
    Onboarding,
}

impl JourneyKind {
    pub const ALL: [JourneyKind; 4] = [
        JourneyKind::Legacy,
        JourneyKind::Gateway,
        JourneyKind::Connectivity,
        JourneyKind::Onboarding,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JourneyKind::Legacy => "legacy",
            JourneyKind::Gateway => "gateway",
            JourneyKind::Connectivity => "connectivity",
            JourneyKind::Onboarding => "onboarding",
        }
    }

    /// Pass fraction used unless the configuration overrides it.
    pub fn default_pass_fraction(&self) -> f64 {
        match self {
            JourneyKind::Legacy | JourneyKind::Gateway => 0.5,
            JourneyKind::Connectivity | JourneyKind::Onboarding => 1.0,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            JourneyKind::Legacy => "auth callback, wallet, key, sign, send, balance",
            JourneyKind::Gateway => {
                "login, wallet, DKG ceremony, signing ceremony, broadcast, balance, chain info"
            }
            JourneyKind::Connectivity => "MPC health, JSON-RPC block number, frontend, chain list",
            JourneyKind::Onboarding => "health, register, wallet, key generation, sign, broadcast",
        }
    }
}

impl std::fmt::Display for JourneyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything needed to run one journey
pub struct JourneyPlan {
    pub kind: JourneyKind,
    pub chain: StepChain,
    /// State the first step starts from
    pub seed: WorkflowState,
    /// Resources that must be ready before the chain runs
    pub readiness: Vec<Arc<dyn ReadinessCheck>>,
    pub cleanup: Option<PretestCleanup>,
    pub policy: PassPolicy,
}

impl JourneyPlan {
    pub fn build(kind: JourneyKind, config: &HarnessConfig) -> CliResult<Self> {
        let Parts {
            steps,
            seed,
            readiness,
            cleanup,
        } = match kind {
            JourneyKind::Legacy => legacy(config)?,
            JourneyKind::Gateway => gateway(config)?,
            JourneyKind::Connectivity => connectivity(config)?,
            JourneyKind::Onboarding => onboarding(config)?,
        };

        let executor = StepExecutor::new().with_default_timeout(config.step_timeout());
        let seed_keys: Vec<String> = seed.keys().map(str::to_string).collect();
        let chain =
            StepChain::with_seed_keys(kind.name(), steps, seed_keys)?.with_executor(executor);
        let fraction = config
            .run
            .pass_fraction
            .unwrap_or_else(|| kind.default_pass_fraction());

        Ok(Self {
            kind,
            chain,
            seed,
            readiness,
            cleanup: cleanup.filter(|_| config.cleanup.enabled),
            policy: PassPolicy::new(fraction),
        })
    }

    pub fn gate_resources(&self) -> Vec<String> {
        self.readiness.iter().map(|c| c.resource()).collect()
    }
}

struct Parts {
    steps: Vec<StepDefinition>,
    seed: WorkflowState,
    readiness: Vec<Arc<dyn ReadinessCheck>>,
    cleanup: Option<PretestCleanup>,
}

impl Parts {
    fn new(steps: Vec<StepDefinition>) -> Self {
        Self {
            steps,
            seed: WorkflowState::new(),
            readiness: Vec::new(),
            cleanup: None,
        }
    }
}

fn readiness(url: String, config: &HarnessConfig) -> CliResult<Arc<dyn ReadinessCheck>> {
    let mut check = HttpReadiness::new(&url)?
        .with_timeout(Duration::from_secs(config.probe.request_timeout_secs.max(1)));
    if let Some(status) = &config.probe.expect_status {
        check = check.require_json_value("/status", status.as_str());
    }
    Ok(Arc::new(check))
}

// ── Legacy ───────────────────────────────────────────────────────────

fn legacy(config: &HarnessConfig) -> CliResult<Parts> {
    let api = TargetClient::new(&config.targets.api_url)?;
    let fx = &config.fixtures;
    let tx = &fx.transfer;
    let slow = Duration::from_secs(15).max(config.step_timeout());

    let steps = vec![
        StepDefinition::new(
            "auth",
            RequestTemplate::post(&api, "/auth/facebook/callback").with_body(json!({
                "access_token": fx.provider_token,
                "user": {
                    "id": fx.provider_user_id,
                    "name": fx.provider_user_name,
                    "email": fx.provider_user_email,
                },
            })),
        )
        .produces(OutputBinding::primary(keys::ACCESS_TOKEN))
        .produces(OutputBinding::primary(keys::USER_ID)),
        StepDefinition::new(
            "wallet",
            RequestTemplate::post(&api, "/users/{user_id}/wallets")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({"wallet_name": fx.wallet_name, "wallet_type": "personal"})),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID])
        .produces(OutputBinding::primary(keys::WALLET_ID)),
        StepDefinition::new(
            "keygen",
            RequestTemplate::post(&api, "/users/{user_id}/wallets/{wallet_id}/mpc/keys")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({"key_type": "secp256k1", "key_purpose": "signing"})),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID])
        .produces(OutputBinding::primary(keys::KEY_ID))
        .with_timeout(slow),
        StepDefinition::new(
            "sign",
            RequestTemplate::post(&api, "/users/{user_id}/wallets/{wallet_id}/mpc/sign")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({
                    "key_id": "{key_id}",
                    "transaction": {
                        "from": tx.from_address,
                        "to": tx.to_address,
                        "value": tx.amount,
                        "gas_limit": tx.gas_limit,
                        "gas_price": tx.gas_price,
                    },
                })),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID, keys::KEY_ID])
        .produces(OutputBinding::primary(keys::SIGNATURE))
        .with_timeout(slow),
        StepDefinition::new(
            "broadcast",
            RequestTemplate::post(&api, "/users/{user_id}/wallets/{wallet_id}/transactions/send")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({
                    "to_address": tx.to_address,
                    "amount": tx.amount,
                    "signature": "{signature}",
                    "chain_id": tx.chain_id,
                })),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID, keys::SIGNATURE])
        .produces(OutputBinding::primary(keys::TX_HASH).at("/transaction_hash"))
        .with_timeout(slow),
        StepDefinition::new(
            "balance",
            RequestTemplate::get(&api, "/users/{user_id}/wallets/{wallet_id}/balance")
                .bearer_from(keys::ACCESS_TOKEN),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID])
        .produces(OutputBinding::secondary(keys::BALANCE)),
    ];

    Ok(Parts {
        readiness: vec![readiness(api.url("/health"), config)?],
        cleanup: Some(PretestCleanup::new(&api, "/users/{identity}")),
        ..Parts::new(steps)
    })
}

// ── Gateway ──────────────────────────────────────────────────────────

fn gateway(config: &HarnessConfig) -> CliResult<Parts> {
    let api = TargetClient::new(&config.targets.api_url)?;
    let blockchain = TargetClient::new(&config.targets.blockchain_url)?;
    let fx = &config.fixtures;
    let tx = &fx.transfer;

    let keygen = Ceremony::new(
        RequestTemplate::post(&api, "/api/v1/mpc/keygen/start")
            .bearer_from(keys::ACCESS_TOKEN)
            .with_body(json!({"wallet_id": "{wallet_id}", "user_id": "{user_id}"})),
    )
    .then(
        RequestTemplate::post(&api, "/api/v1/mpc/keygen/complete")
            .bearer_from(keys::ACCESS_TOKEN)
            .with_body(json!({"session_id": "{session_id}", "participant_data": {}})),
    )
    .with_pause(config.ceremony_pause());

    let signing = Ceremony::new(
        RequestTemplate::post(&api, "/api/v1/mpc/transactions/sign/start")
            .bearer_from(keys::ACCESS_TOKEN)
            .with_body(json!({
                "wallet_id": "{wallet_id}",
                "key_id": "{key_id}",
                "to_address": tx.to_address,
                "amount": tx.amount,
                "chain": tx.chain,
            })),
    )
    .then(
        RequestTemplate::post(&api, "/api/v1/mpc/transactions/sign/complete")
            .bearer_from(keys::ACCESS_TOKEN)
            .with_body(json!({"session_id": "{session_id}", "signature_data": {}})),
    )
    .with_pause(config.ceremony_pause());

    // Generous enough to cover both phases plus the pause
    let ceremony_timeout = config.step_timeout() * 2 + config.ceremony_pause();

    let steps = vec![
        StepDefinition::new(
            "facebook_url",
            RequestTemplate::get(&api, "/api/v1/auth/facebook/url"),
        )
        .with_fallback(SyntheticFallback::empty()),
        StepDefinition::new(
            "auth",
            RequestTemplate::post(&api, "/api/v1/auth/login")
                .with_body(json!({"username": fx.username, "password": fx.password})),
        )
        .produces(OutputBinding::primary(keys::ACCESS_TOKEN).at("/token"))
        .produces(OutputBinding::primary(keys::USER_ID))
        .with_fallback(SyntheticFallback::fixed([
            (keys::ACCESS_TOKEN, "mock_token_123456"),
            (keys::USER_ID, "test_user_001"),
        ])),
        StepDefinition::new(
            "wallet",
            RequestTemplate::post(&api, "/api/v1/wallets")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({"user_id": "{user_id}", "wallet_name": fx.wallet_name})),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID])
        .produces(OutputBinding::primary(keys::WALLET_ID))
        .with_fallback(SyntheticFallback::fixed([(keys::WALLET_ID, "test_wallet")])),
        StepDefinition::new("keygen", keygen)
            .requires([keys::ACCESS_TOKEN, keys::USER_ID, keys::WALLET_ID])
            .produces(OutputBinding::primary(keys::KEY_ID))
            .produces(OutputBinding::secondary(keys::PUBLIC_KEY))
            .with_fallback(SyntheticFallback::fixed([
                (keys::KEY_ID, "mock_key_123456"),
                (keys::PUBLIC_KEY, "mock_public_key_123456"),
            ]))
            .with_timeout(ceremony_timeout),
        StepDefinition::new("sign", signing)
            .requires([keys::ACCESS_TOKEN, keys::WALLET_ID, keys::KEY_ID])
            .produces(OutputBinding::primary(keys::SIGNATURE).at("/signed_tx"))
            .with_fallback(SyntheticFallback::fixed([(
                keys::SIGNATURE,
                "mock_signed_transaction",
            )]))
            .with_timeout(ceremony_timeout),
        StepDefinition::new(
            "broadcast",
            RequestTemplate::post(&api, "/api/v1/transactions/broadcast")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({"signed_transaction": "{signature}", "chain": tx.chain})),
        )
        .requires([keys::ACCESS_TOKEN, keys::WALLET_ID, keys::SIGNATURE])
        .produces(OutputBinding::primary(keys::TX_HASH))
        .with_fallback(SyntheticFallback::fixed([(keys::TX_HASH, "mock_tx_hash_123456")])),
        StepDefinition::new(
            "balance",
            RequestTemplate::get(&api, "/api/v1/wallets/{wallet_id}/balance")
                .bearer_from(keys::ACCESS_TOKEN),
        )
        .requires([keys::ACCESS_TOKEN, keys::WALLET_ID])
        .produces(OutputBinding::secondary(keys::BALANCE))
        .with_fallback(SyntheticFallback::fixed([(keys::BALANCE, "0")])),
        StepDefinition::new("chains", RequestTemplate::get(&blockchain, "/chains"))
            .produces(OutputBinding::secondary("chains"))
            .with_fallback(SyntheticFallback::empty()),
        StepDefinition::new(
            "chain_info",
            RequestTemplate::get(&blockchain, format!("/chains/{}/info", tx.chain)),
        )
        .with_fallback(SyntheticFallback::empty()),
    ];

    Ok(Parts {
        readiness: vec![
            readiness(api.url("/health"), config)?,
            readiness(format!("{}/health", trim(&config.targets.mpc_url)), config)?,
            readiness(blockchain.url("/health"), config)?,
        ],
        ..Parts::new(steps)
    })
}

// ── Connectivity ─────────────────────────────────────────────────────

fn connectivity(config: &HarnessConfig) -> CliResult<Parts> {
    let mpc = TargetClient::new(&config.targets.mpc_url)?;
    let rpc = TargetClient::new(&config.targets.rpc_url)?;
    let frontend = TargetClient::new(&config.targets.frontend_url)?;
    let blockchain = TargetClient::new(&config.targets.blockchain_url)?;

    let steps = vec![
        StepDefinition::new("mpc_health", RequestTemplate::get(&mpc, "/health"))
            .produces(OutputBinding::primary("mpc_ready").at("/success").expecting(true)),
        StepDefinition::new(
            "chain_rpc",
            RequestTemplate::post(&rpc, "/").with_body(json!({
                "jsonrpc": "2.0",
                "method": "eth_blockNumber",
                "params": [],
                "id": 1,
            })),
        )
        .produces(OutputBinding::primary("block_number").at("/result")),
        StepDefinition::new("frontend", RequestTemplate::get(&frontend, "/")),
        StepDefinition::new("chains", RequestTemplate::get(&blockchain, "/chains")),
    ];

    Ok(Parts::new(steps))
}

// ── Onboarding ───────────────────────────────────────────────────────

/// Profile of a user nobody has registered yet
fn fresh_profile(rng: &mut impl Rng) -> WorkflowState {
    WorkflowState::new()
        .with_value("facebook_id", format!("fb_{}", rng.gen_range(1_000_000_000u64..=9_999_999_999)))
        .with_value("email", format!("testuser{}@example.com", rng.gen_range(1000..=9999)))
        .with_value("name", format!("Test User {}", rng.gen_range(1..=100)))
        .with_value("profile_picture", "https://example.com/avatar.jpg")
}

/// Stand-in raw transaction sent with the broadcast request
const SIMULATED_SIGNED_TX: &str = "0xsimulated_signed_transaction";

fn mock_id(prefix: &str) -> String {
    format!("{}_{}", prefix, rand::thread_rng().gen_range(1000..=9999))
}

/// A 20-byte hex address derived from `id`, stable for the same id.
fn pseudo_address(id: &str) -> String {
    let hex: String = id.bytes().map(|b| format!("{:02x}", b)).collect();
    format!("0x{:0<40.40}", hex)
}

fn onboarding(config: &HarnessConfig) -> CliResult<Parts> {
    let api = TargetClient::new(&config.targets.api_url)?;
    let fx = &config.fixtures;
    let tx = &fx.transfer;
    let pause = |units| config.step_pause(units);

    let seed = fresh_profile(&mut rand::thread_rng());
    let profile = json!({
        "facebook_id": "{facebook_id}",
        "email": "{email}",
        "name": "{name}",
        "profile_picture": "{profile_picture}",
    });
    let profile_keys = ["facebook_id", "email", "name", "profile_picture"];

    let steps = vec![
        StepDefinition::new("health", RequestTemplate::get(&api, "/health"))
            .with_pause_after(pause(1)),
        StepDefinition::new(
            "facebook_start",
            RequestTemplate::get(&api, "/api/v1/auth/facebook/start"),
        )
        .with_fallback(SyntheticFallback::empty())
        .with_pause_after(pause(1)),
        StepDefinition::new(
            "register",
            RequestTemplate::post(&api, "/api/v1/auth/register").with_body(profile.clone()),
        )
        .requires(profile_keys)
        .produces(OutputBinding::primary(keys::USER_ID))
        .produces(OutputBinding::primary(keys::ACCESS_TOKEN).at("/token"))
        .with_alternate(
            RequestTemplate::post(&api, "/api/v1/users").with_body(profile),
            [OutputBinding::primary(keys::USER_ID).at("/id")],
        )
        .with_fallback(SyntheticFallback::derived(|_| {
            StatePatch::from([
                (keys::USER_ID.to_string(), json!(mock_id("user"))),
                (keys::ACCESS_TOKEN.to_string(), json!("test_jwt_token_for_simulation")),
            ])
        }))
        .with_pause_after(pause(1)),
        StepDefinition::new(
            "wallet",
            RequestTemplate::post(&api, "/api/v1/wallets")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({
                    "user_id": "{user_id}",
                    "name": fx.wallet_name,
                    "chain_type": tx.chain,
                    "threshold": 2,
                    "total_shares": 3,
                })),
        )
        .requires([keys::ACCESS_TOKEN, keys::USER_ID])
        .produces(OutputBinding::primary(keys::WALLET_ID).at("/id"))
        .produces(OutputBinding::secondary(keys::WALLET_ADDRESS))
        .with_fallback(SyntheticFallback::derived(|_| {
            let wallet_id = mock_id("wallet");
            StatePatch::from([
                (keys::WALLET_ADDRESS.to_string(), json!(pseudo_address(&wallet_id))),
                (keys::WALLET_ID.to_string(), json!(wallet_id)),
            ])
        }))
        .with_pause_after(pause(2)),
        StepDefinition::new(
            "keygen",
            RequestTemplate::post(&api, "/api/v1/mpc/keygen")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({
                    "wallet_id": "{wallet_id}",
                    "participants": ["user", "server"],
                    "threshold": 2,
                })),
        )
        .requires([keys::ACCESS_TOKEN, keys::WALLET_ID])
        .produces(OutputBinding::primary(keys::SESSION_ID))
        .with_fallback(SyntheticFallback::derived(|_| {
            StatePatch::from([(keys::SESSION_ID.to_string(), json!(mock_id("session")))])
        }))
        .with_timeout(Duration::from_secs(30).max(config.step_timeout()))
        .with_pause_after(pause(2)),
        StepDefinition::new(
            "sign",
            RequestTemplate::post(&api, "/api/v1/transactions/sign")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({
                    "wallet_id": "{wallet_id}",
                    "to_address": tx.to_address,
                    "amount": tx.amount,
                    "chain": tx.chain,
                    "gas_limit": tx.gas_limit,
                    "gas_price": tx.gas_price,
                })),
        )
        .requires([keys::ACCESS_TOKEN, keys::WALLET_ID])
        .produces(OutputBinding::primary(keys::TX_HASH))
        .with_timeout(Duration::from_secs(20).max(config.step_timeout()))
        .with_pause_after(pause(1)),
        StepDefinition::new(
            "broadcast",
            RequestTemplate::post(&api, "/api/v1/transactions/broadcast")
                .bearer_from(keys::ACCESS_TOKEN)
                .with_body(json!({"tx_hash": "{tx_hash}", "signed_tx": SIMULATED_SIGNED_TX})),
        )
        .requires([keys::ACCESS_TOKEN, keys::TX_HASH])
        .produces(OutputBinding::secondary("status")),
    ];

    Ok(Parts {
        seed,
        ..Parts::new(steps)
    })
}

fn trim(url: &str) -> &str {
    url.trim_end_matches('/')
}
