//! Step definitions: the declarative description of one journey step
//!
//! A definition names the state keys it needs, the remote call it makes,
//! the keys it extracts from the response and, optionally, how to
//! synthesize those keys when the call does not succeed.

use crate::StepCall;
use journey_types::{is_present, StatePatch, WorkflowState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// ── Output Binding ───────────────────────────────────────────────────

/// Where a produced state key comes from in the response body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBinding {
    /// State key to populate
    pub key: String,
    /// JSON pointer into the response body (RFC 6901)
    pub pointer: String,
    /// Primary bindings form the response contract; a missing primary
    /// output turns a 2xx into a contract error
    pub primary: bool,
    /// When set, any other value at `pointer` counts as absent
    pub expected: Option<Value>,
}

impl OutputBinding {
    /// A primary output read from the top-level field of the same name.
    pub fn primary(key: impl Into<String>) -> Self {
        let key = key.into();
        let pointer = format!("/{}", key);
        Self {
            key,
            pointer,
            primary: true,
            expected: None,
        }
    }

    /// A secondary output: extracted when present, never required.
    pub fn secondary(key: impl Into<String>) -> Self {
        Self {
            primary: false,
            ..Self::primary(key)
        }
    }

    /// Read the value from a different location in the body.
    pub fn at(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = pointer.into();
        self
    }

    /// Only accept the output when it equals `value`, as for a
    /// `{"success": true}` flag.
    pub fn expecting(mut self, value: impl Into<Value>) -> Self {
        self.expected = Some(value.into());
        self
    }

    /// Whether `value`, found at the pointer, satisfies this binding.
    pub fn accepts(&self, value: &Value) -> bool {
        match &self.expected {
            Some(expected) => value == expected,
            None => is_present(value),
        }
    }
}

// ── Synthetic Fallback ───────────────────────────────────────────────

type Generator = dyn Fn(&WorkflowState) -> StatePatch + Send + Sync;

/// Generator of stand-in values used when a step's remote call fails
#[derive(Clone)]
pub struct SyntheticFallback {
    generator: Arc<Generator>,
}

impl SyntheticFallback {
    /// Always produce the same values.
    pub fn fixed<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let patch: StatePatch = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            generator: Arc::new(move |_| patch.clone()),
        }
    }

    /// Compute the values from the state the step was handed.
    pub fn derived<F>(generator: F) -> Self
    where
        F: Fn(&WorkflowState) -> StatePatch + Send + Sync + 'static,
    {
        Self {
            generator: Arc::new(generator),
        }
    }

    /// Nothing to stand in for: the step is still recorded as degraded.
    pub fn empty() -> Self {
        Self {
            generator: Arc::new(|_| StatePatch::new()),
        }
    }

    pub fn generate(&self, state: &WorkflowState) -> StatePatch {
        (self.generator)(state)
    }
}

impl std::fmt::Debug for SyntheticFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticFallback").finish_non_exhaustive()
    }
}

// ── Alternate Route ──────────────────────────────────────────────────

/// A second call tried when the step's own call fails
#[derive(Clone)]
pub struct AlternateRoute {
    pub call: Arc<dyn StepCall>,
    /// Bindings read from the alternate response
    pub outputs: Vec<OutputBinding>,
}

impl std::fmt::Debug for AlternateRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateRoute")
            .field("call", &self.call.describe())
            .field("outputs", &self.outputs)
            .finish()
    }
}

// ── Step Definition ──────────────────────────────────────────────────

/// One named step of a journey
#[derive(Clone)]
pub struct StepDefinition {
    /// Stable, unique name within the chain
    pub name: String,
    /// State keys that must be present before the call is attempted
    pub requires: Vec<String>,
    /// State keys extracted from a successful response
    pub outputs: Vec<OutputBinding>,
    /// The remote operation
    pub call: Arc<dyn StepCall>,
    /// Stand-in values used instead of failing
    pub fallback: Option<SyntheticFallback>,
    /// Second route tried before falling back
    pub alternate: Option<AlternateRoute>,
    /// Per-call timeout; the executor default applies when `None`
    pub timeout: Option<Duration>,
    /// Pause before the next step starts
    pub pause_after: Option<Duration>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, call: impl StepCall + 'static) -> Self {
        Self::with_call(name, Arc::new(call))
    }

    pub fn with_call(name: impl Into<String>, call: Arc<dyn StepCall>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            outputs: Vec::new(),
            call,
            fallback: None,
            alternate: None,
            timeout: None,
            pause_after: None,
        }
    }

    pub fn requires<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.requires.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn produces(mut self, binding: OutputBinding) -> Self {
        self.outputs.push(binding);
        self
    }

    pub fn with_fallback(mut self, fallback: SyntheticFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Try `call` when the primary call fails, reading `outputs` from its
    /// response. Primary keys the alternate does not return are taken from
    /// the fallback and the step is recorded as degraded.
    pub fn with_alternate(
        mut self,
        call: impl StepCall + 'static,
        outputs: impl IntoIterator<Item = OutputBinding>,
    ) -> Self {
        self.alternate = Some(AlternateRoute {
            call: Arc::new(call),
            outputs: outputs.into_iter().collect(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_pause_after(mut self, pause: Duration) -> Self {
        self.pause_after = Some(pause);
        self
    }

    /// State keys read by the step's calls, as far as the calls report them.
    pub fn placeholders(&self) -> Vec<String> {
        let mut keys = self.call.placeholders();
        if let Some(alternate) = &self.alternate {
            for key in alternate.call.placeholders() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Keys that make up this step's response contract.
    pub fn primary_keys(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|b| b.primary)
            .map(|b| b.key.as_str())
            .collect()
    }

    /// Every key this step may write, primary or not.
    pub fn output_keys(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|b| b.key.as_str())
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("call", &self.call.describe())
            .field("requires", &self.requires)
            .field("outputs", &self.outputs)
            .field("fallback", &self.fallback.is_some())
            .field("alternate", &self.alternate)
            .field("timeout", &self.timeout)
            .field("pause_after", &self.pause_after)
            .finish()
    }
}
