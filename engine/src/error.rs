//! Error types for the Circular engine.

use crate::{CollectionName, FieldName};
use thiserror::Error;

/// All possible errors from the Circular engine.
///
/// The merge functions themselves are total and never return these; errors
/// arise only from document edits against an unexpected shape and from
/// snapshot validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("field not found: {0}")]
    FieldNotFound(FieldName),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("kind mismatch for field '{field}': expected {expected}, got {got}")]
    KindMismatch {
        field: FieldName,
        expected: &'static str,
        got: &'static str,
    },

    #[error("item in collection '{collection}' is missing its id attribute")]
    MissingIdAttribute { collection: CollectionName },

    /// A pushed snapshot does not match the expected document shape.
    /// Fatal for the session that received it; no partial merge is attempted.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
