//! Core error types for SBS.

use crate::outcome::Side;
use std::time::Duration;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A query failed on one backend
    #[error("query failed on {side} backend: {cause}")]
    BackendQueryFailed {
        /// Backend that failed
        side: Side,
        /// Underlying failure
        cause: BackendError,
    },

    /// The log source could not be opened or read
    #[error("log source {path} unreadable: {reason}")]
    SourceUnreadable {
        /// Path of the source
        path: String,
        /// I/O failure description
        reason: String,
    },

    /// Invalid configuration
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Internal error (for unexpected errors)
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

/// Failure of a single backend call.
///
/// Never retried. The coordinator treats the failed side's payload as empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Connection or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Backend rejected or failed the query
    #[error("query error: {0}")]
    Query(String),

    /// Response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Call exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// Attach the side this error came from
    #[must_use]
    pub fn on(self, side: Side) -> CoreError {
        CoreError::BackendQueryFailed { side, cause: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_query_failed_display() {
        let err = BackendError::Query("predicate not indexed".to_string()).on(Side::Right);
        assert_eq!(
            err.to_string(),
            "query failed on right backend: query error: predicate not indexed"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = BackendError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "timed out after 3s");
    }

    #[test]
    fn test_source_unreadable_display() {
        let err = CoreError::SourceUnreadable {
            path: "/tmp/alpha.log".to_string(),
            reason: "No such file or directory".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("/tmp/alpha.log"));
        assert!(s.contains("No such file"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = BackendError::Transport("refused".to_string());
        let err2 = BackendError::Transport("refused".to_string());
        assert_eq!(err1, err2);
        assert_ne!(err1, BackendError::Decode("refused".to_string()));
    }
}
