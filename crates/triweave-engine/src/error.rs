//! Engine error model: every failure surfaces as a `(kind, message)`
//! pair; the shell decides how to present it.

use triweave_diff::{DiffError, Selector};
use triweave_weave::WeaveError;

/// Stable error classification exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMemory,
    TooManyLines,
    InconsistentHints,
    SourceNotText,
    Cancelled,
    NotLoaded,
    Internal,
}

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not enough memory to complete the operation")]
    OutOfMemory,

    #[error("too many lines in diff ({0})")]
    TooManyLines(usize),

    #[error("manual alignment hints could not be satisfied")]
    InconsistentHints,

    #[error("input {0} is not text")]
    SourceNotText(Selector),

    #[error("operation cancelled")]
    Cancelled,

    #[error("sources are not loaded")]
    NotLoaded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory => ErrorKind::OutOfMemory,
            Self::TooManyLines(_) => ErrorKind::TooManyLines,
            Self::InconsistentHints => ErrorKind::InconsistentHints,
            Self::SourceNotText(_) => ErrorKind::SourceNotText,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotLoaded => ErrorKind::NotLoaded,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<DiffError> for EngineError {
    fn from(err: DiffError) -> Self {
        match err {
            DiffError::OutOfMemory => Self::OutOfMemory,
        }
    }
}

impl From<WeaveError> for EngineError {
    fn from(err: WeaveError) -> Self {
        match err {
            WeaveError::InconsistentHints { .. } => Self::InconsistentHints,
            other => Self::Internal(other.to_string()),
        }
    }
}
