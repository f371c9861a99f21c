//! SBS Core Types
//!
//! Pure types shared by every SBS crate. No I/O lives here.
//! A replay run moves [`QueryRequest`]s through two backends, produces one
//! [`QueryOutcome`] per side and folds the verdicts into [`RunStats`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod outcome;
pub mod query;
pub mod stats;

// Re-exports
pub use error::{BackendError, CoreError, CoreResult};
pub use outcome::{QueryOutcome, Side};
pub use query::{QueryRequest, Variables};
pub use stats::{RunStats, StatsSnapshot};
