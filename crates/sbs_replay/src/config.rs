//! Replay configuration.

use sbs_backend::{QueryOptions, ReadMode, DEFAULT_QUERY_TIMEOUT};
use sbs_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest work queue a config may ask for
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Number of concurrent query workers
    pub workers: usize,
    /// Queue capacity as a multiple of `workers`
    pub queue_factor: usize,
    /// Interval between progress lines
    pub report_interval: Duration,
    /// Deadline for each backend call
    pub query_timeout: Duration,
    /// Read consistency requested from both backends
    pub read_mode: ReadMode,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_factor: 5,
            report_interval: Duration::from_secs(5),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            read_mode: ReadMode::BestEffort,
        }
    }
}

impl ReplayConfig {
    /// Set the worker count
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue factor
    #[must_use]
    pub fn with_queue_factor(mut self, factor: usize) -> Self {
        self.queue_factor = factor;
        self
    }

    /// Set the progress interval
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the read mode
    #[must_use]
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    /// Work queue capacity
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.workers.saturating_mul(self.queue_factor).max(1)
    }

    /// Backend call options derived from this config
    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::new()
            .with_timeout(self.query_timeout)
            .with_read_mode(self.read_mode)
    }

    /// Check the config can drive a run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero worker count, queue
    /// factor, report interval or timeout, and for a queue capacity above
    /// [`MAX_QUEUE_CAPACITY`].
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |field: &str, reason: &str| CoreError::InvalidConfig {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.queue_factor == 0 {
            return Err(invalid("queue_factor", "must be at least 1"));
        }
        let capacity = self.workers.checked_mul(self.queue_factor);
        if capacity.is_none_or(|c| c > MAX_QUEUE_CAPACITY) {
            return Err(invalid("queue_factor", "workers * queue_factor is too large"));
        }
        if self.report_interval.is_zero() {
            return Err(invalid("report_interval", "must be positive"));
        }
        if self.query_timeout.is_zero() {
            return Err(invalid("query_timeout", "must be positive"));
        }
        Ok(())
    }
}
