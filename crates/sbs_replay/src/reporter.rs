//! Periodic progress reporting.

use sbs_core::{RunStats, StatsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

type Emit = Box<dyn Fn(&StatsSnapshot) + Send + Sync>;

/// Emits a counter snapshot on a fixed interval.
///
/// Reads are plain atomic loads, so the reporter never slows workers; a
/// snapshot may trail the live counters slightly.
pub struct ProgressReporter {
    stats: Arc<RunStats>,
    interval: Duration,
    emit: Emit,
}

impl ProgressReporter {
    /// Create a reporter that logs through `tracing`
    #[must_use]
    pub fn new(stats: Arc<RunStats>, interval: Duration) -> Self {
        Self {
            stats,
            interval,
            emit: Box::new(log_progress),
        }
    }

    /// Replace the emit action
    #[must_use]
    pub fn with_emit<F>(mut self, emit: F) -> Self
    where
        F: Fn(&StatsSnapshot) + Send + Sync + 'static,
    {
        self.emit = Box::new(emit);
        self
    }

    /// Start reporting in a background task until `stop` is cancelled.
    ///
    /// The first line is emitted one interval after start.
    #[must_use]
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    async fn run(self, stop: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = ticker.tick() => (self.emit)(&self.stats.snapshot()),
            }
        }
        tracing::debug!("progress reporter stopped");
    }
}

fn log_progress(snapshot: &StatsSnapshot) {
    tracing::info!(
        target: "sbs::progress",
        total = snapshot.total,
        failed = snapshot.failed,
        left_errors = snapshot.left_errors,
        right_errors = snapshot.right_errors,
        "Total: {} Failed: {}",
        snapshot.total,
        snapshot.failed
    );
}
