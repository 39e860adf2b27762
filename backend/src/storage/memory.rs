//! In-memory persistence engine.
//!
//! Keeps every document in a `BTreeMap` keyed by id. Used by tests and for
//! ephemeral sessions where nothing should touch disk. Behaves identically
//! to the durable engine as far as the domain layer can observe.

use crate::error::EngineError;
use crate::storage::indexes::{run_query, IndexName, QueryOptions, QueryRow};
use crate::storage::traits::{document_id, ChangeEvent, DocRow, DocumentEngine, PutResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct MemoryEngine {
    docs: RwLock<BTreeMap<String, Value>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemoryEngine {
            docs: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    fn notify(&self, id: String, deleted: bool) {
        // A send error only means nobody is listening right now.
        let _ = self.changes.send(ChangeEvent { id, deleted });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.docs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.docs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentEngine for MemoryEngine {
    async fn get(&self, id: &str) -> Result<Option<Value>, EngineError> {
        Ok(self.read().get(id).cloned())
    }

    async fn put(&self, doc: Value) -> Result<PutResult, EngineError> {
        let id = document_id(&doc)?;
        self.write().insert(id.clone(), doc);
        self.notify(id.clone(), false);
        Ok(PutResult { id })
    }

    async fn del(&self, id: &str) -> Result<(), EngineError> {
        self.write().remove(id);
        self.notify(id.to_string(), true);
        Ok(())
    }

    async fn all_docs(&self) -> Result<Vec<DocRow>, EngineError> {
        Ok(self
            .read()
            .iter()
            .map(|(key, doc)| DocRow {
                key: key.clone(),
                doc: Some(doc.clone()),
            })
            .collect())
    }

    async fn query(
        &self,
        index: IndexName,
        opts: QueryOptions,
    ) -> Result<Vec<QueryRow>, EngineError> {
        let snapshot: Vec<(String, Value)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(run_query(snapshot, index, &opts))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_del_round_trip() {
        let engine = MemoryEngine::new();
        let doc = json!({"id": "category:2024-01-01T00:00:00.000Z", "type": "category", "name": "Food"});

        let result = engine.put(doc.clone()).await.unwrap();
        assert_eq!(result.id, "category:2024-01-01T00:00:00.000Z");

        let fetched = engine.get(&result.id).await.unwrap();
        assert_eq!(fetched, Some(doc));

        engine.del(&result.id).await.unwrap();
        assert_eq!(engine.get(&result.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_without_id_is_rejected() {
        let engine = MemoryEngine::new();
        let err = engine.put(json!({"type": "category"})).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingId));
    }

    #[tokio::test]
    async fn writes_publish_change_events() {
        let engine = MemoryEngine::new();
        let mut changes = engine.subscribe();

        engine
            .put(json!({"id": "a", "type": "category", "name": "Food"}))
            .await
            .unwrap();
        let event = changes.recv().await.unwrap();
        assert_eq!(event.id, "a");
        assert!(!event.deleted);

        engine.del("a").await.unwrap();
        let event = changes.recv().await.unwrap();
        assert!(event.deleted);
    }

    #[tokio::test]
    async fn all_docs_enumerates_by_id() {
        let engine = MemoryEngine::new();
        engine.put(json!({"id": "b", "type": "category"})).await.unwrap();
        engine.put(json!({"id": "a", "type": "account"})).await.unwrap();

        let rows = engine.all_docs().await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
