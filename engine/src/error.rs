//! Error types for the Kennel engine.

use crate::{CollectionName, RecordId};
use serde::Serialize;
use thiserror::Error;

/// All possible errors from the Kennel engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // Lookup errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("no {collection} record matches {criteria}")]
    RecordNotFound {
        collection: CollectionName,
        criteria: String,
    },

    #[error("'{field}' is not an association of {collection}")]
    UnknownAssociation {
        collection: CollectionName,
        field: String,
    },

    // Reference errors
    #[error("{collection} record {id} referenced by a staged join does not exist")]
    MissingReference {
        collection: CollectionName,
        id: RecordId,
    },

    // Adapter errors
    #[error("adapter '{adapter}' failed: {message}")]
    Adapter { adapter: String, message: String },

    #[error("adapter '{adapter}' timed out after {millis}ms")]
    Timeout { adapter: String, millis: u64 },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("save already in progress for {collection} record {id}")]
    ConcurrentSave {
        collection: CollectionName,
        id: RecordId,
    },

    // Startup errors
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Coarse classification of an [`Error`], as reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Reference,
    Adapter,
    Schema,
}

impl Error {
    /// Build an adapter error from anything displayable.
    pub fn adapter(adapter: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Adapter {
            adapter: adapter.into(),
            message: err.to_string(),
        }
    }

    /// Which of the error families this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPayload(_)
            | Error::MissingRequiredField(_)
            | Error::TypeMismatch { .. } => ErrorKind::Validation,
            Error::CollectionNotFound(_)
            | Error::RecordNotFound { .. }
            | Error::UnknownAssociation { .. } => ErrorKind::NotFound,
            Error::MissingReference { .. } => ErrorKind::Reference,
            Error::Adapter { .. }
            | Error::Timeout { .. }
            | Error::InvalidSnapshot(_)
            | Error::ConcurrentSave { .. } => ErrorKind::Adapter,
            Error::InvalidSchema(_) => ErrorKind::Schema,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
