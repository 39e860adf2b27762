//! # Storage Traits
//!
//! This module defines the storage abstraction trait that allows different
//! persistence engines to be used interchangeably by the domain layer.

use crate::error::EngineError;
use crate::storage::indexes::{IndexName, QueryOptions, QueryRow};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Notification published after every committed write.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Id of the document that was written or removed
    pub id: String,
    /// True when the write was a deletion
    pub deleted: bool,
}

/// Result of storing a document.
#[derive(Debug, Clone)]
pub struct PutResult {
    /// The id the engine filed the document under
    pub id: String,
}

/// One row of a full-store enumeration.
#[derive(Debug, Clone)]
pub struct DocRow {
    pub key: String,
    pub doc: Option<Value>,
}

/// Trait defining the interface the document store requires from a
/// persistence engine.
///
/// Implementations must publish exactly one [`ChangeEvent`] per committed
/// `put` or `del`; the live-query layer relies on never missing a write.
/// Missed events due to a slow subscriber are acceptable (subscribers
/// recompute from scratch), missing notification of a write is not.
#[async_trait]
pub trait DocumentEngine: Send + Sync + 'static {
    /// Fetch a document by id.
    async fn get(&self, id: &str) -> Result<Option<Value>, EngineError>;

    /// Store a document whole. The document must carry a string `id` field.
    async fn put(&self, doc: Value) -> Result<PutResult, EngineError>;

    /// Remove a document by id. Removing a missing id is a no-op.
    async fn del(&self, id: &str) -> Result<(), EngineError>;

    /// Enumerate every stored document, ordered by id.
    async fn all_docs(&self) -> Result<Vec<DocRow>, EngineError>;

    /// Run a keyed or ranged read against one of the named indexes.
    /// Returns fully materialized rows ordered per the requested direction.
    async fn query(
        &self,
        index: IndexName,
        opts: QueryOptions,
    ) -> Result<Vec<QueryRow>, EngineError>;

    /// Subscribe to the change notification channel.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Pull the `id` field out of a document offered for storage.
pub(crate) fn document_id(doc: &Value) -> Result<String, EngineError> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(EngineError::MissingId)
}
