//! End-to-end tests of the `journey` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: [&str; 6] = [
    "JOURNEY_CONFIG",
    "JOURNEY_API_URL",
    "JOURNEY_MPC_URL",
    "JOURNEY_BLOCKCHAIN_URL",
    "JOURNEY_RPC_URL",
    "JOURNEY_FRONTEND_URL",
];

/// Binary isolated from the caller's environment and config file.
fn journey(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("journey").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1")
        .arg("--config")
        .arg(dir.path().join("absent.toml"));
    cmd
}

#[test]
fn catalog_lists_every_journey() {
    let dir = tempfile::tempdir().unwrap();
    journey(&dir)
        .arg("catalog")
        .assert()
        .success()
        .stdout(predicate::str::contains("legacy"))
        .stdout(predicate::str::contains("gateway"))
        .stdout(predicate::str::contains("connectivity"))
        .stdout(predicate::str::contains("onboarding"));
}

#[test]
fn config_prints_defaults_when_file_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    journey(&dir)
        .args(["config", "--output", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:3000"))
        .stdout(predicate::str::contains("testuser@example.com"));
}

#[test]
fn invalid_pass_fraction_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    journey(&dir)
        .args(["run", "--pass-fraction", "1.5", "--no-probe"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pass_fraction"));
}

#[test]
fn unavailable_service_exits_with_gate_status() {
    let dir = tempfile::tempdir().unwrap();
    journey(&dir)
        .args([
            "run",
            "--journey",
            "legacy",
            "--api-url",
            "http://127.0.0.1:9",
            "--max-attempts",
            "1",
            "--interval-secs",
            "0",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not ready after 1 attempts"));
}

#[tokio::test]
async fn failing_gateway_passes_on_synthetic_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .mount(&server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .with_priority(10)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        journey(&dir)
            .args(["run", "--journey", "gateway", "--output", "json"])
            .args(["--api-url", &uri, "--mpc-url", &uri, "--blockchain-url", &uri])
            .args(["--max-attempts", "1", "--interval-secs", "0"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["aggregate"]["degraded"], 9);
    assert_eq!(summary["aggregate"]["succeeded"], 0);
    assert_eq!(summary["aggregate"]["verdict"], true);
    assert_eq!(summary["readiness"].as_array().map(Vec::len), Some(3));

    let outcomes: Vec<&str> = summary["report"]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["outcome"]["outcome"].as_str().unwrap())
        .collect();
    assert_eq!(outcomes, vec!["degraded"; 9]);
}

fn outcomes(summary: &Value) -> Vec<String> {
    summary["report"]["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["outcome"]["outcome"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn missing_cleanup_identity_does_not_stop_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/testuser@example.com"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "healthy"})))
        .mount(&server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .with_priority(10)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        journey(&dir)
            .args(["run", "--journey", "legacy", "--output", "json", "--api-url", &uri])
            .args(["--max-attempts", "1", "--interval-secs", "0"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["cleanup"]["result"], "not_found");
    assert_eq!(summary["readiness"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        outcomes(&summary),
        vec!["failed", "skipped", "skipped", "skipped", "skipped", "skipped"]
    );
    assert_eq!(summary["aggregate"]["verdict"], false);
}

#[test]
fn refused_cleanup_connection_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = journey(&dir)
        .args(["run", "--journey", "legacy", "--output", "json", "--no-probe"])
        .args(["--api-url", "http://127.0.0.1:9", "--step-timeout-secs", "2"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["cleanup"]["result"], "unreachable");
    assert_eq!(summary["report"]["records"].as_array().map(Vec::len), Some(6));
    assert_eq!(outcomes(&summary)[0], "failed");
    assert_eq!(
        summary["report"]["records"][0]["outcome"]["cause"]["kind"],
        "transport"
    );
}
