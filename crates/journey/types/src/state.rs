//! Workflow state: the accumulating record threaded through a journey
//!
//! A `WorkflowState` is a snapshot. Steps never mutate the snapshot they
//! were handed; they return a new one built with [`WorkflowState::merged`].
//! Keys are append-only: once a key holds a present value, later patches
//! cannot replace it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ── Well-known keys ──────────────────────────────────────────────────

/// Semantic keys produced by the wallet journey.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const USER_ID: &str = "user_id";
    pub const WALLET_ID: &str = "wallet_id";
    pub const WALLET_ADDRESS: &str = "wallet_address";
    pub const SESSION_ID: &str = "session_id";
    pub const KEY_ID: &str = "key_id";
    pub const PUBLIC_KEY: &str = "public_key";
    pub const SIGNATURE: &str = "signature";
    pub const TX_HASH: &str = "tx_hash";
    pub const BALANCE: &str = "balance";
}

/// Values a step produced, keyed by state key.
pub type StatePatch = BTreeMap<String, Value>;

/// Returns true when a value counts as "present": not null, not an empty
/// string, not an empty array or object.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Immutable-per-step snapshot of everything the journey has learned so far
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    entries: BTreeMap<String, Value>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with an initial value (builder style).
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// The value for `key` rendered as a plain string, if it is a scalar.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.entries.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Whether `key` exists and holds a non-empty value.
    pub fn contains_present(&self, key: &str) -> bool {
        self.entries.get(key).map(is_present).unwrap_or(false)
    }

    /// Keys from `required` that are absent or empty, in declared order.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|key| !self.contains_present(key))
            .map(str::to_string)
            .collect()
    }

    /// Build the next snapshot by applying `patch`.
    ///
    /// Keys that already hold a present value are left untouched and are
    /// returned as the second element so callers can log the conflict.
    pub fn merged(&self, patch: &StatePatch) -> (WorkflowState, Vec<String>) {
        let mut next = self.clone();
        let mut ignored = Vec::new();

        for (key, value) in patch {
            if self.contains_present(key) {
                if self.entries.get(key) != Some(value) {
                    ignored.push(key.clone());
                }
                continue;
            }
            next.entries.insert(key.clone(), value.clone());
        }

        (next, ignored)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<StatePatch> for WorkflowState {
    fn from(entries: StatePatch) -> Self {
        Self { entries }
    }
}
