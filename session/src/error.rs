//! Error types for document sessions.

use crate::store::StoreError;
use thiserror::Error;

/// All possible errors from a document session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The requested document identity does not exist. Terminal: the
    /// session cannot become active.
    #[error("document not found")]
    NotFound,

    /// The store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A pushed snapshot failed shape validation. Fatal for the session.
    #[error(transparent)]
    Snapshot(#[from] circular_engine::Error),

    /// The session's actor task has already exited.
    #[error("session terminated")]
    Terminated,
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
