//! Per-backend query outcomes.

use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two compared backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Left backend (reference)
    Left,
    /// Right backend (candidate)
    Right,
}

impl Side {
    /// Lowercase name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one query on one backend.
///
/// On failure `payload` is empty and `error` holds the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Backend that produced this outcome
    pub side: Side,
    /// Raw JSON text returned by the backend
    pub payload: String,
    /// Failure, if the call did not succeed
    pub error: Option<BackendError>,
}

impl QueryOutcome {
    /// Successful outcome
    #[must_use]
    pub fn success(side: Side, payload: String) -> Self {
        Self {
            side,
            payload,
            error: None,
        }
    }

    /// Failed outcome with an empty payload
    #[must_use]
    pub fn failure(side: Side, error: BackendError) -> Self {
        Self {
            side,
            payload: String::new(),
            error: Some(error),
        }
    }

    /// Build from a backend call result
    #[must_use]
    pub fn from_result(side: Side, result: Result<String, BackendError>) -> Self {
        match result {
            Ok(payload) => Self::success(side, payload),
            Err(error) => Self::failure(side, error),
        }
    }

    /// Whether the backend call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
