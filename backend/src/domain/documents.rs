//! Document store facade.
//!
//! Uniform create/read/update/delete semantics across the four document
//! kinds, delegated to the injected persistence engine. The generic
//! operations work on raw JSON maps; the typed wrappers pin the kind tag so
//! callers cannot mix document kinds.

use crate::error::{EngineError, StoreError};
use crate::storage::DocumentEngine;
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{
    Account, AccountPatch, Budget, BudgetPatch, Category, CategoryPatch, DocumentKind,
    StoredDocument, Transaction, TransactionPatch,
};
use std::sync::Arc;

/// Envelope fields that callers may never set or overwrite through a
/// payload or patch.
const RESERVED_FIELDS: [&str; 4] = ["id", "type", "createdAt", "updatedAt"];

pub struct DocumentService<E> {
    engine: Arc<E>,
}

impl<E> Clone for DocumentService<E> {
    fn clone(&self) -> Self {
        DocumentService {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: DocumentEngine> DocumentService<E> {
    pub fn new(engine: Arc<E>) -> Self {
        DocumentService { engine }
    }

    /// Create a document of the given kind from a raw payload map.
    ///
    /// Stamps a fresh id plus matching `createdAt`/`updatedAt`, persists,
    /// and returns the stored document including the id the engine filed it
    /// under. Fields absent from the payload are simply absent from the
    /// document; present-but-falsy values (`0`, `false`, `""`, `null`) are
    /// stored as-is.
    pub async fn add_document(
        &self,
        kind: DocumentKind,
        payload: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        let now = Utc::now();
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut doc = Map::new();
        doc.insert("id".to_string(), Value::String(kind.generate_id(now)));
        doc.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        for (field, value) in payload {
            if !RESERVED_FIELDS.contains(&field.as_str()) {
                doc.insert(field, value);
            }
        }
        doc.insert("createdAt".to_string(), Value::String(stamp.clone()));
        doc.insert("updatedAt".to_string(), Value::String(stamp));

        let result = self.engine.put(Value::Object(doc.clone())).await?;
        debug!("added {} document {}", kind, result.id);

        doc.insert("id".to_string(), Value::String(result.id));
        Ok(Value::Object(doc))
    }

    /// Merge a partial payload over an existing document.
    ///
    /// The merge is shallow: a field present in the patch replaces the
    /// stored value whole (nested objects are not deep-merged), a field
    /// absent from the patch leaves the stored value untouched. Envelope
    /// fields cannot be overwritten; `updatedAt` is re-stamped.
    pub async fn update_document(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        let current = self
            .engine
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        let mut doc = into_object(current)?;

        for (field, value) in patch {
            if !RESERVED_FIELDS.contains(&field.as_str()) {
                doc.insert(field, value);
            }
        }
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        doc.insert("updatedAt".to_string(), Value::String(stamp));

        let result = self.engine.put(Value::Object(doc.clone())).await?;
        debug!("updated document {}", result.id);

        doc.insert("id".to_string(), Value::String(result.id));
        Ok(Value::Object(doc))
    }

    /// Remove a document by id.
    ///
    /// Resolves the current document first, both to fail loudly on a
    /// missing id and to delete by the id the document is actually stored
    /// under rather than the caller-supplied one.
    pub async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let current = self
            .engine
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let stored_id = current
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        self.engine.del(&stored_id).await?;
        debug!("deleted document {}", stored_id);
        Ok(())
    }

    /// Typed fetch by id. `Ok(None)` when the id resolves to nothing.
    pub async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        match self.engine.get(id).await? {
            Some(value) => {
                let doc = serde_json::from_value(value).map_err(EngineError::from)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn add_typed<T: Serialize>(
        &self,
        kind: DocumentKind,
        data: &T,
    ) -> Result<StoredDocument, StoreError> {
        let stored = self.add_document(kind, to_payload(data)?).await?;
        Ok(serde_json::from_value(stored).map_err(EngineError::from)?)
    }

    async fn update_typed<T: Serialize>(
        &self,
        id: &str,
        patch: &T,
    ) -> Result<StoredDocument, StoreError> {
        let stored = self.update_document(id, to_payload(patch)?).await?;
        Ok(serde_json::from_value(stored).map_err(EngineError::from)?)
    }

    pub async fn add_transaction(&self, data: Transaction) -> Result<StoredDocument, StoreError> {
        self.add_typed(DocumentKind::Transaction, &data).await
    }

    pub async fn add_category(&self, data: Category) -> Result<StoredDocument, StoreError> {
        self.add_typed(DocumentKind::Category, &data).await
    }

    pub async fn add_account(&self, data: Account) -> Result<StoredDocument, StoreError> {
        self.add_typed(DocumentKind::Account, &data).await
    }

    pub async fn add_budget(&self, data: Budget) -> Result<StoredDocument, StoreError> {
        self.add_typed(DocumentKind::Budget, &data).await
    }

    pub async fn update_transaction(
        &self,
        id: &str,
        patch: TransactionPatch,
    ) -> Result<StoredDocument, StoreError> {
        self.update_typed(id, &patch).await
    }

    pub async fn update_category(
        &self,
        id: &str,
        patch: CategoryPatch,
    ) -> Result<StoredDocument, StoreError> {
        self.update_typed(id, &patch).await
    }

    pub async fn update_account(
        &self,
        id: &str,
        patch: AccountPatch,
    ) -> Result<StoredDocument, StoreError> {
        self.update_typed(id, &patch).await
    }

    pub async fn update_budget(
        &self,
        id: &str,
        patch: BudgetPatch,
    ) -> Result<StoredDocument, StoreError> {
        self.update_typed(id, &patch).await
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<(), StoreError> {
        self.delete_document(id).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), StoreError> {
        self.delete_document(id).await
    }

    pub async fn delete_account(&self, id: &str) -> Result<(), StoreError> {
        self.delete_document(id).await
    }

    pub async fn delete_budget(&self, id: &str) -> Result<(), StoreError> {
        self.delete_document(id).await
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Engine(EngineError::Storage(
            "stored document is not a JSON object".to_string(),
        ))),
    }
}

fn to_payload<T: Serialize>(data: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(data).map_err(EngineError::from)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Engine(EngineError::Storage(
            "payload is not a JSON object".to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEngine;
    use chrono::{TimeZone, Utc};
    use shared::DocumentData;

    fn service() -> DocumentService<MemoryEngine> {
        DocumentService::new(Arc::new(MemoryEngine::new()))
    }

    fn sample_transaction() -> Transaction {
        Transaction {
            date: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            amount: 45.67,
            category: "Food".to_string(),
            account: "Checking".to_string(),
            description: "Grocery shopping".to_string(),
            is_expense: true,
            tags: Some(vec!["essential".to_string(), "groceries".to_string()]),
            subcategory: Some("Groceries".to_string()),
        }
    }

    #[tokio::test]
    async fn add_then_fetch_round_trips() {
        let service = service();
        let stored = service.add_transaction(sample_transaction()).await.unwrap();

        assert!(stored.id.starts_with("transaction:"));
        assert_eq!(stored.created_at, stored.updated_at);

        let fetched = service.get_document(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
        assert_eq!(fetched.as_transaction().unwrap().amount, 45.67);
    }

    #[tokio::test]
    async fn partial_update_preserves_untouched_fields() {
        let service = service();
        let stored = service.add_transaction(sample_transaction()).await.unwrap();

        let updated = service
            .update_transaction(
                &stored.id,
                TransactionPatch {
                    amount: Some(50.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let tx = updated.as_transaction().unwrap();
        assert_eq!(tx.amount, 50.0);
        assert_eq!(tx.category, "Food");
        assert_eq!(tx.description, "Grocery shopping");
        assert_eq!(tx.tags.as_deref(), Some(&["essential".to_string(), "groceries".to_string()][..]));
        assert_eq!(updated.created_at, stored.created_at);
        assert!(updated.updated_at >= stored.updated_at);
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let service = service();
        let err = service
            .update_transaction("transaction:nope", TransactionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_requires_existing_document() {
        let service = service();
        let err = service.delete_document("category:nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let stored = service
            .add_category(Category {
                name: "Food".to_string(),
                color: "#4CAF50".to_string(),
                icon: "utensils".to_string(),
                parent: None,
                subcategories: None,
            })
            .await
            .unwrap();

        service.delete_category(&stored.id).await.unwrap();
        assert!(service.get_document(&stored.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn absent_optional_fields_are_not_persisted() {
        let service = service();
        let stored = service
            .add_transaction(Transaction {
                tags: None,
                subcategory: None,
                ..sample_transaction()
            })
            .await
            .unwrap();

        let raw = service
            .engine
            .get(&stored.id)
            .await
            .unwrap()
            .unwrap();
        let obj = raw.as_object().unwrap();
        assert!(!obj.contains_key("tags"));
        assert!(!obj.contains_key("subcategory"));
        assert_eq!(obj["isExpense"], Value::Bool(true));
    }

    #[tokio::test]
    async fn patch_cannot_overwrite_envelope_fields() {
        let service = service();
        let stored = service.add_transaction(sample_transaction()).await.unwrap();

        let mut sneaky = Map::new();
        sneaky.insert("id".to_string(), Value::String("other".to_string()));
        sneaky.insert("type".to_string(), Value::String("budget".to_string()));
        sneaky.insert("amount".to_string(), serde_json::json!(1.0));

        let merged = service.update_document(&stored.id, sneaky).await.unwrap();
        assert_eq!(merged["id"], Value::String(stored.id.clone()));
        assert_eq!(merged["type"], Value::String("transaction".to_string()));
        assert_eq!(merged["amount"], serde_json::json!(1.0));
    }

    #[tokio::test]
    async fn category_patch_can_clear_parent() {
        let service = service();
        let stored = service
            .add_category(Category {
                name: "Groceries".to_string(),
                color: "#4CAF50".to_string(),
                icon: "utensils".to_string(),
                parent: Some("Food".to_string()),
                subcategories: None,
            })
            .await
            .unwrap();

        let updated = service
            .update_category(
                &stored.id,
                CategoryPatch {
                    parent: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.as_category().unwrap().parent, None);

        // Leaving parent out of the patch keeps the stored value.
        let repatched = service
            .update_category(
                &stored.id,
                CategoryPatch {
                    color: Some("#FF0000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        match &repatched.data {
            DocumentData::Category(c) => {
                assert_eq!(c.parent, None);
                assert_eq!(c.color, "#FF0000");
            }
            other => panic!("expected category, got {:?}", other),
        }
    }
}
