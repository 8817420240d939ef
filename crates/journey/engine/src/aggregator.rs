//! Result Aggregator: turn a run report into a verdict

use journey_types::RunReport;
use serde::{Deserialize, Serialize};

/// Lowest accepted pass fraction
pub const MIN_PASS_FRACTION: f64 = 0.5;

/// Fraction of declared steps that must pass for a run to pass
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassPolicy {
    fraction: f64,
}

impl PassPolicy {
    /// Clamps `fraction` into `[0.5, 1.0]`; NaN falls back to half.
    pub fn new(fraction: f64) -> Self {
        let fraction = if fraction.is_nan() {
            MIN_PASS_FRACTION
        } else {
            fraction.clamp(MIN_PASS_FRACTION, 1.0)
        };
        Self { fraction }
    }

    /// Every declared step must pass.
    pub fn strict() -> Self {
        Self::new(1.0)
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Minimum number of passing steps out of `total`.
    pub fn threshold(&self, total: usize) -> usize {
        // Tolerance keeps 0.5 * 6 at 3 rather than drifting to 4
        let raw = total as f64 * self.fraction;
        (raw - 1e-9).ceil().max(0.0) as usize
    }
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self::new(MIN_PASS_FRACTION)
    }
}

/// Derived counts and verdict for one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Steps that ended Success or Degraded
    pub passed: usize,
    /// Of `passed`, those that reached the real service
    pub succeeded: usize,
    /// Of `passed`, those bridged by synthetic values
    pub degraded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Declared step count, executed or not
    pub total: usize,
    pub threshold: usize,
    pub verdict: bool,
}

impl Aggregate {
    /// Whether the verdict relied on synthetic values at all.
    pub fn relied_on_fallbacks(&self) -> bool {
        self.degraded > 0
    }
}

/// Pure function from a report to an [`Aggregate`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultAggregator {
    policy: PassPolicy,
}

impl ResultAggregator {
    pub fn new(policy: PassPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PassPolicy {
        self.policy
    }

    pub fn aggregate(&self, report: &RunReport) -> Aggregate {
        let counts = report.counts();
        let total = report.declared_steps;
        let passed = counts.attempted_ok();
        let threshold = self.policy.threshold(total);

        Aggregate {
            passed,
            succeeded: counts.succeeded,
            degraded: counts.degraded,
            skipped: counts.skipped,
            failed: counts.failed,
            total,
            threshold,
            verdict: passed >= threshold,
        }
    }
}
