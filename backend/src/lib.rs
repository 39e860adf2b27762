//! # SpendSage Backend
//!
//! Local-first document store and live-query layer for the SpendSage
//! personal finance tracker.
//!
//! The backend is UI-agnostic: it records transactions, categories,
//! accounts, and budgets as typed JSON documents in a keyed store and keeps
//! query results current through change subscriptions, so any frontend can
//! render dashboards without polling.
//!
//! ## Architecture
//!
//! The backend follows a layered architecture:
//! ```text
//! UI layer (out of scope here)
//!     ↓
//! Domain layer (store facade, queries, imports, bulk operations)
//!     ↓
//! Storage layer (persistence engines, indexes, change notification)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Stamp, persist, and merge typed financial documents
//! - Serve type-tagged index reads and keep subscriptions live
//! - Import CSV and JSON data with partial-failure tolerance
//! - Clear and repopulate the whole store for resets and demos

pub mod domain;
pub mod error;
pub mod storage;

pub use error::{EngineError, StoreError};

use domain::{
    CsvImportService, DataExchangeService, DataManagementService, DocumentService, QueryService,
};
use std::sync::Arc;
use storage::DocumentEngine;

/// Main application state bundling every service over one injected engine.
///
/// Construct this once at startup with the engine of your choice
/// ([`storage::SledEngine`] for durable local data,
/// [`storage::MemoryEngine`] for tests and previews) and hand clones to
/// whoever needs them.
pub struct AppState<E: DocumentEngine> {
    pub documents: DocumentService<E>,
    pub queries: QueryService<E>,
    pub csv_import: CsvImportService<E>,
    pub data_exchange: DataExchangeService<E>,
    pub data_management: DataManagementService<E>,
}

impl<E: DocumentEngine> AppState<E> {
    pub fn new(engine: Arc<E>) -> Self {
        let documents = DocumentService::new(Arc::clone(&engine));
        AppState {
            queries: QueryService::new(Arc::clone(&engine)),
            csv_import: CsvImportService::new(documents.clone()),
            data_exchange: DataExchangeService::new(Arc::clone(&engine), documents.clone()),
            data_management: DataManagementService::new(Arc::clone(&engine), documents.clone()),
            documents,
        }
    }
}

impl<E: DocumentEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        AppState {
            documents: self.documents.clone(),
            queries: self.queries.clone(),
            csv_import: self.csv_import.clone(),
            data_exchange: self.data_exchange.clone(),
            data_management: self.data_management.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::Transaction;
    use storage::MemoryEngine;

    #[tokio::test]
    async fn app_state_services_share_one_store() {
        let state = AppState::new(Arc::new(MemoryEngine::new()));

        state
            .documents
            .add_transaction(Transaction {
                date: Utc::now(),
                amount: 12.5,
                category: "Food".to_string(),
                account: "Checking".to_string(),
                description: "Lunch".to_string(),
                is_expense: true,
                tags: None,
                subcategory: None,
            })
            .await
            .unwrap();

        assert_eq!(state.queries.transactions().await.unwrap().len(), 1);
        assert!(state.data_management.clear_database().await.unwrap());
        assert!(state.queries.transactions().await.unwrap().is_empty());
    }
}
