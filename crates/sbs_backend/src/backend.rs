//! Backend connection trait.

use async_trait::async_trait;
use sbs_core::{BackendError, QueryRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call deadline
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1800);

/// Read consistency requested from a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Read-only, may serve slightly stale data, no transaction coordination
    #[default]
    BestEffort,
    /// Read-only at the latest committed timestamp
    Strict,
}

/// Per-call options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Deadline for one call
    pub timeout: Duration,
    /// Read consistency
    pub read_mode: ReadMode,
}

impl QueryOptions {
    /// Options with the default timeout and best-effort reads
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_QUERY_TIMEOUT,
            read_mode: ReadMode::BestEffort,
        }
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the read mode
    #[must_use]
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection to one backend instance.
///
/// Handles are created and owned by the caller and shared read-only by every
/// replay worker, so implementations must be `Send + Sync` and must not need
/// `&mut self` to issue queries.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Address this backend talks to, for logs
    fn endpoint(&self) -> &str;

    /// Run one query and return the raw JSON result
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the call fails for any reason.
    async fn query(
        &self,
        request: &QueryRequest,
        options: &QueryOptions,
    ) -> Result<String, BackendError>;
}
