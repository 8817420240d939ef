//! Availability gate configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling policy for a readiness resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Attempts before the resource is declared unavailable.
    pub max_attempts: u32,

    /// Fixed pause between a failed attempt and the next one.
    pub interval: Duration,

    /// Upper bound on a single readiness request.
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ProbeConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Longest the gate can block on one resource, ignoring request time.
    pub fn worst_case_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}
