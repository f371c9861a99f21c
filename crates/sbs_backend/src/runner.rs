//! Runs one query against one backend.

use crate::backend::{Backend, QueryOptions};
use sbs_core::{BackendError, QueryOutcome, QueryRequest, Side};
use std::sync::Arc;

/// Binds a backend handle to its side and call options.
///
/// The runner enforces the timeout itself as well as passing it on, so a
/// backend that ignores the option still cannot hold a worker past the
/// deadline. Failures are returned inside the outcome and never retried.
#[derive(Clone)]
pub struct QueryRunner {
    backend: Arc<dyn Backend>,
    side: Side,
    options: QueryOptions,
}

impl QueryRunner {
    /// Create a runner with default options
    #[must_use]
    pub fn new(side: Side, backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            side,
            options: QueryOptions::default(),
        }
    }

    /// Set call options
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Side this runner queries
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Backend endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    /// Call options
    #[must_use]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Execute `request` and wrap the result
    pub async fn run(&self, request: &QueryRequest) -> QueryOutcome {
        let call = self.backend.query(request, &self.options);
        let result = match tokio::time::timeout(self.options.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.options.timeout)),
        };
        QueryOutcome::from_result(self.side, result)
    }
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner")
            .field("side", &self.side)
            .field("endpoint", &self.backend.endpoint())
            .field("options", &self.options)
            .finish()
    }
}
