//! Closed error taxonomy for the checkpoint engine.
//!
//! Every fallible engine operation returns [`EngineError`], mapped down to
//! one of six kinds so that callers can match on failure class rather than
//! on a specific backend's error type. Lower-level errors (`std::io`,
//! `serde_json`, `gix`) are wrapped, never re-exported.

use thiserror::Error;

/// Result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Closed error taxonomy (see external interfaces / error handling design).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl EngineError {
    /// A ref that moved out from under a compare-and-set update.
    pub fn ref_conflict(ref_name: &str) -> Self {
        Self::Conflict(format!("ref moved concurrently: {ref_name}"))
    }

    /// A malformed identifier or state document.
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Invalid(format!("malformed json: {err}"))
    }
}
