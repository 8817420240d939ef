//! Journey Client: HTTP bindings for journey steps.
//!
//! Turns declarative request templates into [`journey_engine::StepCall`]s
//! backed by reqwest, chains them into multi-phase ceremonies, and runs
//! the best-effort cleanup that precedes every journey.

#![deny(unsafe_code)]

pub mod ceremony;
pub mod cleanup;
pub mod client;
pub mod error;
pub mod template;

pub use ceremony::Ceremony;
pub use cleanup::{CleanupOutcome, PretestCleanup};
pub use client::{TargetClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, ClientResult};
pub use template::{RenderedRequest, RequestTemplate};
