//! Mismatch records and where they go.
//!
//! A mismatch is reported the moment it is detected; nothing is retained
//! by the coordinator after the sink returns.

use sbs_core::{QueryOutcome, QueryRequest, Variables};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// A query whose two results differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// The replayed request
    pub request: QueryRequest,
    /// Left backend outcome
    pub left: QueryOutcome,
    /// Right backend outcome
    pub right: QueryOutcome,
    /// JSON pointer to the first differing location
    pub divergence: Option<String>,
}

/// Serializable view of a [`Mismatch`]
#[derive(Debug, Serialize)]
pub struct MismatchRecord<'a> {
    /// Query text
    pub query: &'a str,
    /// Variable bindings
    pub variables: &'a Variables,
    /// Left payload
    pub left: &'a str,
    /// Right payload
    pub right: &'a str,
    /// Left failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_error: Option<String>,
    /// Right failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_error: Option<String>,
    /// First differing location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<&'a str>,
}

impl Mismatch {
    /// Borrow as a serializable record
    #[must_use]
    pub fn record(&self) -> MismatchRecord<'_> {
        MismatchRecord {
            query: self.request.text(),
            variables: self.request.variables(),
            left: &self.left.payload,
            right: &self.right.payload,
            left_error: self.left.error.as_ref().map(ToString::to_string),
            right_error: self.right.error.as_ref().map(ToString::to_string),
            divergence: self.divergence.as_deref(),
        }
    }
}

/// Receives mismatches as workers detect them.
///
/// Called concurrently from many workers.
pub trait MismatchSink: Send + Sync {
    /// Handle one mismatch
    fn report(&self, mismatch: &Mismatch);
}

/// Emits each mismatch as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MismatchSink for TracingSink {
    fn report(&self, mismatch: &Mismatch) {
        tracing::warn!(
            target: "sbs::mismatch",
            query = mismatch.request.text(),
            vars = ?mismatch.request.variables(),
            left = %mismatch.left.payload,
            right = %mismatch.right.payload,
            left_error = ?mismatch.left.error,
            right_error = ?mismatch.right.error,
            divergence = mismatch.divergence.as_deref().unwrap_or(""),
            "query results differ"
        );
    }
}

/// Write buffer of a [`JsonLinesSink`]
const SINK_BUFFER: usize = 64 * 1024;

/// Appends each mismatch as one JSON line.
///
/// Records are buffered so workers only touch the disk once per buffer. The
/// buffer is flushed on [`flush`](Self::flush) and on drop.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open (or create) `path` for appending
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(SINK_BUFFER, file)),
        })
    }

    /// Write buffered records to the file
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write fails.
    pub fn flush(&self) -> std::io::Result<()> {
        match self.writer.lock() {
            Ok(mut writer) => writer.flush(),
            Err(_) => Err(std::io::Error::other("mismatch writer poisoned")),
        }
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "cannot flush mismatch records");
        }
    }
}

impl MismatchSink for JsonLinesSink {
    fn report(&self, mismatch: &Mismatch) {
        let line = match serde_json::to_string(&mismatch.record()) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode mismatch record");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            tracing::error!("mismatch writer poisoned");
            return;
        };
        if let Err(e) = writeln!(writer, "{line}") {
            tracing::error!(error = %e, "cannot write mismatch record");
        }
    }
}

/// Forwards to several sinks in order
pub struct Tee(pub Vec<Box<dyn MismatchSink>>);

impl MismatchSink for Tee {
    fn report(&self, mismatch: &Mismatch) {
        for sink in &self.0 {
            sink.report(mismatch);
        }
    }
}

/// Keeps mismatches in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    seen: Mutex<Vec<Mismatch>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mismatches received so far
    #[must_use]
    pub fn mismatches(&self) -> Vec<Mismatch> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl MismatchSink for MemorySink {
    fn report(&self, mismatch: &Mismatch) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(mismatch.clone());
        }
    }
}
