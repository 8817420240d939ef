//! HTTP client for the service under test

use crate::error::{ClientError, ClientResult};
use journey_engine::CallResponse;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::time::Duration;

/// Default request timeout when a call does not set its own
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin reqwest wrapper bound to one base URL
#[derive(Clone, Debug)]
pub struct TargetClient {
    client: Client,
    base_url: String,
}

impl TargetClient {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ClientError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through, so
    /// one journey can reach services on other hosts.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send one request and collect the raw response.
    ///
    /// Only transport problems are errors; every status code, including
    /// 4xx and 5xx, comes back as a [`CallResponse`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
        timeout: Option<Duration>,
    ) -> ClientResult<CallResponse> {
        let url = self.url(path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Convenience GET without auth.
    pub async fn get(&self, path: &str) -> ClientResult<CallResponse> {
        self.send(Method::GET, path, None, None, None).await
    }

    /// Convenience DELETE without auth.
    pub async fn delete(&self, path: &str) -> ClientResult<CallResponse> {
        self.send(Method::DELETE, path, None, None, None).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> ClientResult<CallResponse> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(CallResponse::text(status, &text))
    }
}
