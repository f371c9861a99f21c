//! Shared run counters.
//!
//! One [`RunStats`] lives for one replay run and is shared by `Arc` between
//! every worker and the progress reporter. All updates are atomic.

use crate::outcome::Side;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a replay run
#[derive(Debug, Default)]
pub struct RunStats {
    total: AtomicU64,
    failed: AtomicU64,
    left_errors: AtomicU64,
    right_errors: AtomicU64,
}

impl RunStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed query and its verdict.
    ///
    /// `total` is bumped before `failed` so that `failed <= total` holds for
    /// any reader that loads `failed` first.
    pub fn record(&self, matched: bool) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if !matched {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Record a backend failure on one side
    pub fn record_backend_error(&self, side: Side) {
        let counter = match side {
            Side::Left => &self.left_errors,
            Side::Right => &self.right_errors,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Queries processed so far
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Queries whose results differed
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Take a non-blocking snapshot.
    ///
    /// May lag the live values slightly but always satisfies
    /// `failed <= total`.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let failed = self.failed.load(Ordering::SeqCst);
        let left_errors = self.left_errors.load(Ordering::SeqCst);
        let right_errors = self.right_errors.load(Ordering::SeqCst);
        let total = self.total.load(Ordering::SeqCst);
        StatsSnapshot {
            total,
            failed,
            left_errors,
            right_errors,
        }
    }
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Queries processed
    pub total: u64,
    /// Queries whose results differed
    pub failed: u64,
    /// Backend failures on the left side
    pub left_errors: u64,
    /// Backend failures on the right side
    pub right_errors: u64,
}

impl StatsSnapshot {
    /// Queries whose results matched
    #[must_use]
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed)
    }

    /// Fraction of processed queries that mismatched (0.0 - 1.0)
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total as f64
    }
}
