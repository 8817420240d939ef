//! Journey Probe: the availability gate.
//!
//! Before a journey runs, each dependency is polled until it answers with
//! a 2xx or the attempt budget runs out. Exhaustion is fatal to the run;
//! nothing downstream degrades around a service that never came up.

#![deny(unsafe_code)]

pub mod check;
pub mod config;
pub mod error;
pub mod prober;

pub use check::{HttpReadiness, ProbeResult, ReadinessCheck};
pub use config::ProbeConfig;
pub use error::{GateResult, ProbeError};
pub use prober::{AvailabilityProber, ProbeEvent, Readiness};
