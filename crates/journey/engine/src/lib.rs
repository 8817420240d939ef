//! Journey Engine: step execution, chaining and verdicts
//!
//! A journey is an ordered list of [`StepDefinition`]s. The [`StepChain`]
//! runs them one after another, handing each the state snapshot produced
//! by its predecessor. The [`StepExecutor`] classifies every step as
//! success, degraded, skipped or failed, and the [`ResultAggregator`]
//! reduces the resulting report to a pass/fail verdict.
//!
//! The engine is transport-agnostic: remote interactions sit behind the
//! [`StepCall`] trait.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod call;
pub mod chain;
pub mod definition;
pub mod executor;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use aggregator::{Aggregate, PassPolicy, ResultAggregator, MIN_PASS_FRACTION};
pub use call::{CallResponse, StepCall};
pub use chain::{ChainObserver, NoopObserver, StepChain};
pub use definition::{AlternateRoute, OutputBinding, StepDefinition, SyntheticFallback};
pub use executor::{StepExecutor, DEFAULT_CALL_TIMEOUT};
