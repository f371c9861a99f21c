//! SBS Backends
//!
//! The connection seam between the replay engine and the systems being
//! compared. [`Backend`] is the injected handle; [`QueryRunner`] binds one
//! handle to a side and a per-call timeout and turns every call into a
//! [`sbs_core::QueryOutcome`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod http;
pub mod runner;

pub use backend::{Backend, QueryOptions, ReadMode, DEFAULT_QUERY_TIMEOUT};
pub use http::DgraphHttpBackend;
pub use runner::QueryRunner;
