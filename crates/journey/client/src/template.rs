//! Request templates: declarative HTTP calls rendered from workflow state
//!
//! A template is a method, a path that may contain `{key}` placeholders,
//! an optional JSON body whose string leaves of the exact form `"{key}"`
//! are replaced with state values, and an optional state key whose value
//! is sent as a bearer token.
//!
//! Path values are percent-encoded as single segments; body values are
//! inserted as raw JSON.
//!
//! Rendering never mutates anything: the same template and the same state
//! always produce the same request.

use crate::client::TargetClient;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use journey_engine::{CallResponse, StepCall};
use journey_types::{StepFailure, WorkflowState};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Characters escaped when a state value lands in one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode `value` for use as a single path segment.
pub(crate) fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// A request with every placeholder resolved
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

/// One HTTP call, parameterised by workflow state
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    client: TargetClient,
    method: Method,
    path: String,
    body: Option<Value>,
    bearer_key: Option<String>,
    timeout: Option<Duration>,
}

impl RequestTemplate {
    pub fn new(client: &TargetClient, method: Method, path: impl Into<String>) -> Self {
        Self {
            client: client.clone(),
            method,
            path: path.into(),
            body: None,
            bearer_key: None,
            timeout: None,
        }
    }

    pub fn get(client: &TargetClient, path: impl Into<String>) -> Self {
        Self::new(client, Method::GET, path)
    }

    pub fn post(client: &TargetClient, path: impl Into<String>) -> Self {
        Self::new(client, Method::POST, path)
    }

    pub fn delete(client: &TargetClient, path: impl Into<String>) -> Self {
        Self::new(client, Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send the value of state key `key` as `Authorization: Bearer ...`.
    pub fn bearer_from(mut self, key: impl Into<String>) -> Self {
        self.bearer_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Every state key this template reads, in first-use order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_path_keys(&self.path, &mut keys);
        if let Some(body) = &self.body {
            collect_body_keys(body, &mut keys);
        }
        if let Some(key) = &self.bearer_key {
            keys.push(key.clone());
        }
        let mut seen = std::collections::HashSet::new();
        keys.retain(|k| seen.insert(k.clone()));
        keys
    }

    /// Resolve every placeholder against `state`.
    pub fn render(&self, state: &WorkflowState) -> ClientResult<RenderedRequest> {
        let mut missing = Vec::new();

        let path = render_path(&self.path, state, &mut missing);
        let body = self
            .body
            .as_ref()
            .map(|body| render_body(body, state, &mut missing));
        let bearer = self.bearer_key.as_ref().and_then(|key| {
            let token = state.get_str(key).filter(|t| !t.trim().is_empty());
            if token.is_none() {
                missing.push(key.clone());
            }
            token
        });

        if !missing.is_empty() {
            let mut seen = std::collections::HashSet::new();
            missing.retain(|k| seen.insert(k.clone()));
            return Err(ClientError::Unresolved(missing));
        }

        Ok(RenderedRequest {
            method: self.method.clone(),
            path,
            body,
            bearer,
        })
    }
}

#[async_trait]
impl StepCall for RequestTemplate {
    async fn invoke(&self, state: &WorkflowState) -> Result<CallResponse, StepFailure> {
        let request = self.render(state)?;
        debug!(method = %request.method, path = %request.path, "Sending request");
        let response = self
            .client
            .send(
                request.method,
                &request.path,
                request.body.as_ref(),
                request.bearer.as_deref(),
                self.timeout,
            )
            .await?;
        Ok(response)
    }

    fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    fn placeholders(&self) -> Vec<String> {
        RequestTemplate::placeholders(self)
    }
}

/// A piece of a templated string.
enum Segment<'a> {
    Literal(&'a str),
    Key(&'a str),
}

/// Split `{key}` placeholders out of `text`; other braces stay literal.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_key(&after[..close]) => {
                out.push(Segment::Literal(&rest[..open]));
                out.push(Segment::Key(&after[..close]));
                rest = &after[close + 1..];
            }
            _ => {
                out.push(Segment::Literal(&rest[..=open]));
                rest = after;
            }
        }
    }
    out.push(Segment::Literal(rest));
    out
}

fn is_key(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// The key of a string leaf of the exact form `{key}`.
fn exact_placeholder(text: &str) -> Option<&str> {
    text.strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .filter(|k| is_key(k))
}

fn collect_path_keys(path: &str, keys: &mut Vec<String>) {
    for segment in segments(path) {
        if let Segment::Key(key) = segment {
            keys.push(key.to_string());
        }
    }
}

fn collect_body_keys(body: &Value, keys: &mut Vec<String>) {
    match body {
        Value::String(s) => {
            if let Some(key) = exact_placeholder(s) {
                keys.push(key.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_body_keys(v, keys)),
        Value::Object(map) => map.values().for_each(|v| collect_body_keys(v, keys)),
        _ => {}
    }
}

fn render_path(path: &str, state: &WorkflowState, missing: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in segments(path) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Key(key) => match state.get_str(key).filter(|v| !v.trim().is_empty()) {
                Some(value) => out.push_str(&encode_segment(&value)),
                None => missing.push(key.to_string()),
            },
        }
    }
    out
}

fn render_body(body: &Value, state: &WorkflowState, missing: &mut Vec<String>) -> Value {
    match body {
        Value::String(s) => match exact_placeholder(s) {
            Some(key) if state.contains_present(key) => {
                state.get(key).cloned().unwrap_or(Value::Null)
            }
            Some(key) => {
                missing.push(key.to_string());
                Value::Null
            }
            None => body.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| render_body(v, state, missing))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_body(v, state, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}
