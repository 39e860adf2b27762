//! Durable persistence engine backed by sled.
//!
//! Documents live JSON-encoded in a single `documents` tree, keyed by their
//! id. Every write is flushed so a crash never loses an acknowledged
//! mutation. Index reads scan the tree and evaluate the shared index
//! mappers; at personal-finance scale a full scan is cheap and keeps the
//! engine free of index-maintenance state.

use crate::error::EngineError;
use crate::storage::indexes::{run_query, IndexName, QueryOptions, QueryRow};
use crate::storage::traits::{document_id, ChangeEvent, DocRow, DocumentEngine, PutResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;
const DOCUMENTS_TREE: &str = "documents";

pub struct SledEngine {
    db: sled::Db,
    tree: sled::Tree,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SledEngine {
    /// Open (or create) a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(DOCUMENTS_TREE)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(SledEngine { db, tree, changes })
    }

    fn notify(&self, id: String, deleted: bool) {
        let _ = self.changes.send(ChangeEvent { id, deleted });
    }

    fn flush(&self) -> Result<(), EngineError> {
        self.db.flush()?;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(String, Value)>, EngineError> {
        let mut docs = Vec::new();
        for entry in self.tree.iter() {
            let (key, bytes) = entry?;
            let id = String::from_utf8_lossy(&key).to_string();
            let doc: Value = serde_json::from_slice(&bytes)?;
            docs.push((id, doc));
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentEngine for SledEngine {
    async fn get(&self, id: &str) -> Result<Option<Value>, EngineError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, doc: Value) -> Result<PutResult, EngineError> {
        let id = document_id(&doc)?;
        let bytes = serde_json::to_vec(&doc)?;
        self.tree.insert(id.as_bytes(), bytes)?;
        self.flush()?;
        self.notify(id.clone(), false);
        Ok(PutResult { id })
    }

    async fn del(&self, id: &str) -> Result<(), EngineError> {
        self.tree.remove(id.as_bytes())?;
        self.flush()?;
        self.notify(id.to_string(), true);
        Ok(())
    }

    async fn all_docs(&self) -> Result<Vec<DocRow>, EngineError> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|(key, doc)| DocRow {
                key,
                doc: Some(doc),
            })
            .collect())
    }

    async fn query(
        &self,
        index: IndexName,
        opts: QueryOptions,
    ) -> Result<Vec<QueryRow>, EngineError> {
        Ok(run_query(self.scan()?, index, &opts))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
