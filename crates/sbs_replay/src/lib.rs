//! SBS Replay Engine
//!
//! Replays logged queries against two backends side by side and reports
//! where their results diverge.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compare;
pub mod config;
pub mod coordinator;
pub mod mismatch;
pub mod reporter;

pub use compare::{first_divergence, json_equal, values_equal, MAX_JSON_DEPTH};
pub use config::{ReplayConfig, MAX_QUEUE_CAPACITY};
pub use coordinator::{Coordinator, RunSummary};
pub use mismatch::{JsonLinesSink, MemorySink, Mismatch, MismatchRecord, MismatchSink, Tee, TracingSink};
pub use reporter::ProgressReporter;
