//! Availability Prober: the gate in front of every journey run.
//!
//! Polls a readiness check with a bounded number of attempts and a fixed
//! pause between them. There is no exponential backoff and no degradation:
//! an exhausted resource stops the run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::check::{ProbeResult, ReadinessCheck};
use crate::config::ProbeConfig;
use crate::error::{GateResult, ProbeError};

/// Progress notifications, one `Attempt` per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProbeEvent {
    Attempt {
        resource: String,
        attempt: u32,
        max_attempts: u32,
        result: ProbeResult,
    },
    Backoff {
        resource: String,
        attempt: u32,
        delay_ms: u64,
    },
    Ready {
        resource: String,
        attempts: u32,
    },
    Exhausted {
        resource: String,
        attempts: u32,
    },
}

/// Full account of polling one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub resource: String,
    pub ready: bool,
    /// Requests issued
    pub attempts: u32,
    /// Pauses taken between requests
    pub backoffs: u32,
    pub last: Option<ProbeResult>,
}

/// Polls readiness checks under a [`ProbeConfig`].
pub struct AvailabilityProber {
    config: ProbeConfig,
    event_tx: broadcast::Sender<ProbeEvent>,
}

impl AvailabilityProber {
    pub fn new(config: ProbeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { config, event_tx }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProbeEvent> {
        self.event_tx.subscribe()
    }

    /// Poll `check` until it is ready or `max_attempts` requests were made.
    pub async fn wait_until_ready(
        &self,
        check: &dyn ReadinessCheck,
        max_attempts: u32,
        interval: Duration,
    ) -> bool {
        self.probe(check, max_attempts, interval).await.ready
    }

    /// Like [`Self::wait_until_ready`] but returns the whole polling record.
    ///
    /// Sleeps only after a non-ready attempt that is not the last one, so a
    /// resource ready on attempt `n` costs exactly `n - 1` pauses.
    #[instrument(skip(self, check), fields(resource = %check.resource()))]
    pub async fn probe(
        &self,
        check: &dyn ReadinessCheck,
        max_attempts: u32,
        interval: Duration,
    ) -> Readiness {
        let resource = check.resource();
        let max_attempts = max_attempts.max(1);
        let mut backoffs = 0;
        let mut last = None;

        for attempt in 1..=max_attempts {
            let result = self.attempt(check, &resource).await;
            let ready = result.ready;

            debug!(
                attempt,
                max_attempts,
                ready,
                status = ?result.status,
                message = result.message.as_deref().unwrap_or(""),
                "Readiness attempt"
            );
            let _ = self.event_tx.send(ProbeEvent::Attempt {
                resource: resource.clone(),
                attempt,
                max_attempts,
                result: result.clone(),
            });
            last = Some(result);

            if ready {
                info!(attempts = attempt, "Resource ready");
                let _ = self.event_tx.send(ProbeEvent::Ready {
                    resource: resource.clone(),
                    attempts: attempt,
                });
                return Readiness {
                    resource,
                    ready: true,
                    attempts: attempt,
                    backoffs,
                    last,
                };
            }

            if attempt < max_attempts {
                let _ = self.event_tx.send(ProbeEvent::Backoff {
                    resource: resource.clone(),
                    attempt,
                    delay_ms: interval.as_millis() as u64,
                });
                tokio::time::sleep(interval).await;
                backoffs += 1;
            }
        }

        warn!(attempts = max_attempts, "Resource never became ready");
        let _ = self.event_tx.send(ProbeEvent::Exhausted {
            resource: resource.clone(),
            attempts: max_attempts,
        });
        Readiness {
            resource,
            ready: false,
            attempts: max_attempts,
            backoffs,
            last,
        }
    }

    /// Gate on several resources in order using the configured policy.
    ///
    /// Stops at the first resource that never becomes ready.
    pub async fn wait_until_all_ready(
        &self,
        checks: &[Arc<dyn ReadinessCheck>],
    ) -> GateResult<Vec<Readiness>> {
        let mut records = Vec::with_capacity(checks.len());
        for check in checks {
            let readiness = self
                .probe(check.as_ref(), self.config.max_attempts, self.config.interval)
                .await;
            if !readiness.ready {
                return Err(ProbeError::Exhausted {
                    resource: readiness.resource,
                    attempts: readiness.attempts,
                });
            }
            records.push(readiness);
        }
        Ok(records)
    }

    async fn attempt(&self, check: &dyn ReadinessCheck, resource: &str) -> ProbeResult {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, check.check()).await {
            Ok(result) => result,
            Err(_) => ProbeResult::timeout(resource, timeout.as_millis() as u64),
        }
    }
}

impl Default for AvailabilityProber {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}
