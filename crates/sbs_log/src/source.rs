//! Line-oriented log source.
//!
//! The source is read once, front to back. Lines that are not valid UTF-8
//! are decoded lossily so one corrupt record cannot end a replay.

use sbs_core::CoreError;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Errors raised by a log source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source could not be opened
    #[error("cannot open log file {}: {source}", .path.display())]
    Unreadable {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Reading failed partway through
    #[error("read failed after line {line}: {source}")]
    Read {
        /// Last line read successfully
        line: u64,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl From<SourceError> for CoreError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unreadable { path, source } => CoreError::SourceUnreadable {
                path: path.display().to_string(),
                reason: source.to_string(),
            },
            SourceError::Read { line, source } => CoreError::SourceUnreadable {
                path: format!("<line {line}>"),
                reason: source.to_string(),
            },
        }
    }
}

/// Streaming reader of log lines
pub struct LogSource<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: u64,
}

impl LogSource<BufReader<File>> {
    /// Open a log file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unreadable`] if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| SourceError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> LogSource<R> {
    /// Wrap any buffered async reader
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Read`] on an I/O failure.
    pub async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|source| SourceError::Read {
                line: self.lines_read,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        self.lines_read += 1;
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Lines returned so far
    #[must_use]
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}
