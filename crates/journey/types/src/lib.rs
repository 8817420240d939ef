//! Journey domain types
//!
//! A journey is an ordered chain of remote steps (authenticate, provision a
//! wallet, generate a key, sign, broadcast, read the balance). This crate
//! holds the data that flows through such a chain:
//!
//! - [`WorkflowState`]: append-only snapshot of tokens and identifiers
//! - [`StepOutcome`] / [`StepFailure`]: how each step ended, and why
//! - [`RunReport`]: the ordered record of a whole run
//!
//! The engine that executes chains lives in `journey-engine`.

#![deny(unsafe_code)]

pub mod errors;
pub mod outcome;
pub mod report;
pub mod state;

pub use errors::{JourneyError, JourneyResult};
pub use outcome::{FailureKind, StepFailure, StepOutcome};
pub use report::{OutcomeCounts, RunId, RunReport, StepRecord};
pub use state::{is_present, keys, StatePatch, WorkflowState};
