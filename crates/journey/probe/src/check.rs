//! Readiness checks.
//!
//! A check issues one lightweight request against a resource and reports
//! whether it is ready. Checks never retry; retry policy belongs to the
//! [`crate::AvailabilityProber`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{GateResult, ProbeError};

/// Result of a single readiness attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Resource that was checked.
    pub resource: String,

    /// Whether the resource reported ready.
    pub ready: bool,

    /// HTTP status, when a response arrived at all.
    pub status: Option<u16>,

    /// Latency of the attempt in milliseconds.
    pub latency_ms: u64,

    /// Why the resource is not ready.
    pub message: Option<String>,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ProbeResult {
    pub fn ready(resource: impl Into<String>, status: u16, latency_ms: u64) -> Self {
        Self {
            resource: resource.into(),
            ready: true,
            status: Some(status),
            latency_ms,
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// A response arrived but did not signal readiness.
    pub fn not_ready(
        resource: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            resource: resource.into(),
            ready: false,
            status: Some(status),
            latency_ms,
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// No response at all: refused connection, DNS failure and the like.
    pub fn unreachable(resource: impl Into<String>, message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            resource: resource.into(),
            ready: false,
            status: None,
            latency_ms,
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn timeout(resource: impl Into<String>, timeout_ms: u64) -> Self {
        Self::unreachable(
            resource,
            format!("readiness check timed out after {}ms", timeout_ms),
            timeout_ms,
        )
    }
}

/// Something the availability gate can poll.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// Name of the polled resource, used in logs and events.
    fn resource(&self) -> String;

    /// Perform one attempt. Must not retry.
    async fn check(&self) -> ProbeResult;
}

/// HTTP GET readiness check: any 2xx means ready.
#[derive(Debug, Clone)]
pub struct HttpReadiness {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    expect: Option<(String, serde_json::Value)>,
}

impl HttpReadiness {
    pub fn new(url: &str) -> GateResult<Self> {
        let parsed = Url::parse(url).map_err(|e| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            url: parsed,
            timeout: Duration::from_secs(5),
            expect: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Also require the JSON body to hold `expected` at `pointer`, as in
    /// `{"status": "healthy"}` at `/status`.
    pub fn require_json_value(
        mut self,
        pointer: impl Into<String>,
        expected: impl Into<serde_json::Value>,
    ) -> Self {
        self.expect = Some((pointer.into(), expected.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ReadinessCheck for HttpReadiness {
    fn resource(&self) -> String {
        self.url.to_string()
    }

    #[instrument(skip(self), fields(resource = %self.url))]
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return ProbeResult::timeout(self.resource(), self.timeout.as_millis() as u64)
            }
            Err(e) => return ProbeResult::unreachable(self.resource(), e.to_string(), latency_ms),
        };

        let status = response.status();
        if !status.is_success() {
            return ProbeResult::not_ready(
                self.resource(),
                status.as_u16(),
                format!("status {}", status),
                latency_ms,
            );
        }

        let Some((pointer, expected)) = &self.expect else {
            return ProbeResult::ready(self.resource(), status.as_u16(), latency_ms);
        };

        let matched = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .is_some_and(|body| body.pointer(pointer) == Some(expected));

        debug!(pointer = %pointer, matched, "Checked readiness body");

        if matched {
            ProbeResult::ready(self.resource(), status.as_u16(), latency_ms)
        } else {
            ProbeResult::not_ready(
                self.resource(),
                status.as_u16(),
                format!("body does not report {} = {}", pointer, expected),
                latency_ms,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpReadiness::new("not a url").unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_2xx_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let check = HttpReadiness::new(&format!("{}/health", server.uri())).unwrap();
        let result = check.check().await;

        assert!(result.ready);
        assert_eq!(result.status, Some(204));
    }

    #[tokio::test]
    async fn test_5xx_is_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = HttpReadiness::new(&server.uri()).unwrap().check().await;

        assert!(!result.ready);
        assert_eq!(result.status, Some(503));
    }

    #[tokio::test]
    async fn test_expected_body_value_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/starting"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "starting"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let check = |route: &str| {
            HttpReadiness::new(&format!("{}{}", server.uri(), route))
                .unwrap()
                .require_json_value("/status", "healthy")
        };

        assert!(check("/up").check().await.ready);

        let starting = check("/starting").check().await;
        assert!(!starting.ready);
        assert_eq!(starting.status, Some(200));
        assert!(starting.message.unwrap().contains("/status"));

        assert!(!check("/html").check().await.ready);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Port 9 (discard) is closed on test machines
        let result = HttpReadiness::new("http://127.0.0.1:9/health")
            .unwrap()
            .with_timeout(Duration::from_millis(500))
            .check()
            .await;

        assert!(!result.ready);
        assert!(result.status.is_none());
        assert!(result.message.is_some());
    }
}
