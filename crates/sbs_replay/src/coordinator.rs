//! Replay coordinator.
//!
//! One producer streams the log and feeds a bounded queue; a fixed pool of
//! workers drains it, running every query on the left backend and then on the
//! right, comparing the results and updating the shared [`RunStats`].
//!
//! ```text
//! Streaming ──(source exhausted, queue closed)──▶ Draining ──(workers joined)──▶ Done
//! ```

use crate::compare::{first_divergence, json_equal};
use crate::config::ReplayConfig;
use crate::mismatch::{Mismatch, MismatchSink, TracingSink};
use crate::reporter::ProgressReporter;
use sbs_backend::{Backend, QueryRunner};
use sbs_core::{CoreResult, QueryOutcome, QueryRequest, RunStats, Side, StatsSnapshot};
use sbs_log::{extract, LogSource};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result of a finished replay run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Final counters
    pub stats: StatsSnapshot,
    /// Lines read from the source
    pub lines_read: u64,
    /// Queries handed to workers
    pub dispatched: u64,
    /// Streaming stopped on a read error
    pub source_truncated: bool,
    /// The run was cancelled before every queued query was processed
    pub cancelled: bool,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Lines that did not hold a query
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.lines_read.saturating_sub(self.dispatched)
    }

    /// Wall time in whole milliseconds, saturating
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn log(&self) {
        tracing::info!(
            total = self.stats.total,
            failed = self.stats.failed,
            left_errors = self.stats.left_errors,
            right_errors = self.stats.right_errors,
            lines = self.lines_read,
            skipped = self.skipped(),
            truncated = self.source_truncated,
            cancelled = self.cancelled,
            elapsed_ms = self.elapsed_ms(),
            "replay finished"
        );
    }
}

struct StreamStats {
    lines_read: u64,
    dispatched: u64,
    truncated: bool,
    cancelled: bool,
}

/// Drives one or more replay runs against a pair of backends
pub struct Coordinator {
    left: QueryRunner,
    right: QueryRunner,
    config: ReplayConfig,
    sink: Arc<dyn MismatchSink>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Create a coordinator for two backend handles.
    ///
    /// The handles stay owned by the caller; the coordinator only shares them.
    ///
    /// # Errors
    ///
    /// Returns [`sbs_core::CoreError::InvalidConfig`] if `config` is invalid.
    pub fn new(
        left: Arc<dyn Backend>,
        right: Arc<dyn Backend>,
        config: ReplayConfig,
    ) -> CoreResult<Self> {
        config.validate()?;
        let options = config.query_options();
        Ok(Self {
            left: QueryRunner::new(Side::Left, left).with_options(options),
            right: QueryRunner::new(Side::Right, right).with_options(options),
            config,
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        })
    }

    /// Send mismatches to `sink` instead of the log
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MismatchSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stop the run early when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replay every query in `source` and wait for all workers to finish.
    ///
    /// Per-query failures never abort the run. A read error mid-stream ends
    /// streaming, lets queued work drain and is flagged in the summary.
    pub async fn run<R>(&self, source: LogSource<R>) -> RunSummary
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        let stats = Arc::new(RunStats::new());
        let (tx, rx) = mpsc::channel::<QueryRequest>(self.config.queue_capacity());
        let queue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                left: self.left.clone(),
                right: self.right.clone(),
                stats: Arc::clone(&stats),
                sink: Arc::clone(&self.sink),
                queue: Arc::clone(&queue),
                cancel: self.cancel.clone(),
            };
            workers.spawn(worker.run());
        }

        let stop_reporter = CancellationToken::new();
        let reporter = ProgressReporter::new(Arc::clone(&stats), self.config.report_interval)
            .spawn(stop_reporter.clone());

        tracing::info!(
            workers = self.config.workers,
            queue = self.config.queue_capacity(),
            left = self.left.endpoint(),
            right = self.right.endpoint(),
            "replay started"
        );

        let streamed = self.stream(source, tx).await;

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "replay worker aborted");
            }
        }

        stop_reporter.cancel();
        if let Err(e) = reporter.await {
            tracing::error!(error = %e, "progress reporter aborted");
        }

        let summary = RunSummary {
            stats: stats.snapshot(),
            lines_read: streamed.lines_read,
            dispatched: streamed.dispatched,
            source_truncated: streamed.truncated,
            // workers stop dequeuing on cancellation even after the source ended
            cancelled: streamed.cancelled || self.cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };
        summary.log();
        summary
    }

    /// Producer: read lines, keep the queries, feed the queue.
    ///
    /// Dropping `tx` on return closes the queue.
    async fn stream<R>(&self, mut source: LogSource<R>, tx: mpsc::Sender<QueryRequest>) -> StreamStats
    where
        R: AsyncBufRead + Unpin,
    {
        let mut dispatched = 0;
        let mut truncated = false;
        let mut cancelled = false;

        loop {
            let line = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                line = source.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "log source read failed, draining queued queries");
                    truncated = true;
                    break;
                }
            };

            let request = match extract(&line) {
                Ok(request) => request,
                Err(skip) => {
                    tracing::trace!(line = source.lines_read(), reason = %skip.reason, "skipping line");
                    continue;
                }
            };

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                sent = tx.send(request) => {
                    if sent.is_err() {
                        tracing::error!("all replay workers exited, stopping");
                        break;
                    }
                    dispatched += 1;
                }
            }
        }

        if cancelled {
            tracing::warn!(lines = source.lines_read(), "replay cancelled");
        }

        StreamStats {
            lines_read: source.lines_read(),
            dispatched,
            truncated,
            cancelled,
        }
    }
}

struct Worker {
    id: usize,
    left: QueryRunner,
    right: QueryRunner,
    stats: Arc<RunStats>,
    sink: Arc<dyn MismatchSink>,
    queue: Arc<Mutex<mpsc::Receiver<QueryRequest>>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker = self.id, "worker started");
        while let Some(request) = self.next().await {
            self.process(request).await;
        }
        tracing::debug!(worker = self.id, "worker finished");
    }

    /// Next queued request, or `None` once the queue is closed and empty or
    /// the run is cancelled
    async fn next(&self) -> Option<QueryRequest> {
        let mut queue = self.queue.lock().await;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            request = queue.recv() => request,
        }
    }

    async fn process(&self, request: QueryRequest) {
        let left = self.left.run(&request).await;
        self.note_failure(&left);
        let right = self.right.run(&request).await;
        self.note_failure(&right);

        let matched = json_equal(&left.payload, &right.payload);
        self.stats.record(matched);

        if !matched {
            let divergence = first_divergence(&left.payload, &right.payload);
            self.sink.report(&Mismatch {
                request,
                left,
                right,
                divergence,
            });
        }
    }

    fn note_failure(&self, outcome: &QueryOutcome) {
        if let Some(cause) = &outcome.error {
            self.stats.record_backend_error(outcome.side);
            let err = cause.clone().on(outcome.side);
            tracing::error!(worker = self.id, side = %outcome.side, error = %err, "backend query failed");
        }
    }
}
