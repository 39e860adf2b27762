//! Error types for the document store.
//!
//! Single-document operations surface these directly; batch operations
//! (CSV import, bulk clear, populate) catch item-level failures, record
//! them in their result types, and keep going.

use thiserror::Error;

/// Failures inside the persistence engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A document offered for storage carries no string `id` field
    #[error("document has no string id")]
    MissingId,

    /// Underlying storage failed (I/O, tree access, ...)
    #[error("storage failure: {0}")]
    Storage(String),

    /// A stored value could not be encoded or decoded as JSON
    #[error("corrupt document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<sled::Error> for EngineError {
    fn from(err: sled::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

/// Failures of single-document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update or delete referenced an id that resolves to nothing
    #[error("document not found: {id}")]
    NotFound { id: String },

    /// The underlying engine failed to read or write
    #[error(transparent)]
    Engine(#[from] EngineError),
}
