//! JSON import and export.
//!
//! Two import paths with deliberately different trust levels:
//!
//! - [`DataExchangeService::import_data`] validates an entire heterogeneous
//!   batch before a single write happens, so a bad batch changes nothing.
//! - [`DataExchangeService::import_json`] replays a previously exported
//!   dump straight through the engine, trusting the file.
//!
//! Export dumps every stored document as pretty-printed JSON for backup.

use crate::domain::documents::DocumentService;
use crate::domain::validation::{
    validate_account, validate_budget, validate_category, validate_transaction, ValidationError,
};
use crate::storage::DocumentEngine;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{Account, Budget, Category, Transaction};
use std::sync::Arc;

/// Per-kind counters of written documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub categories: usize,
    pub accounts: usize,
    pub transactions: usize,
    pub budgets: usize,
}

/// Outcome of a structured batch import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub errors: Vec<ValidationError>,
    pub imported: ImportCounts,
}

/// A heterogeneous batch of raw documents to import, grouped by kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportBatch {
    pub categories: Vec<Value>,
    pub accounts: Vec<Value>,
    pub transactions: Vec<Value>,
    pub budgets: Vec<Value>,
}

pub struct DataExchangeService<E> {
    engine: Arc<E>,
    documents: DocumentService<E>,
}

impl<E> Clone for DataExchangeService<E> {
    fn clone(&self) -> Self {
        DataExchangeService {
            engine: Arc::clone(&self.engine),
            documents: self.documents.clone(),
        }
    }
}

struct ValidatedBatch {
    categories: Vec<Category>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
}

impl<E: DocumentEngine> DataExchangeService<E> {
    pub fn new(engine: Arc<E>, documents: DocumentService<E>) -> Self {
        DataExchangeService { engine, documents }
    }

    /// Validate and import a batch. All-or-nothing at the validation stage:
    /// one invalid row anywhere means nothing is written.
    pub async fn import_data(&self, batch: &ImportBatch) -> Result<ImportReport> {
        let mut errors = Vec::new();
        let validated = self.validate_batch(batch, &mut errors);

        if !errors.is_empty() {
            info!(
                "structured import rejected: {} validation errors across the batch",
                errors.len()
            );
            return Ok(ImportReport {
                success: false,
                errors,
                imported: ImportCounts::default(),
            });
        }

        let mut imported = ImportCounts::default();
        match self.write_batch(validated, &mut imported).await {
            Ok(()) => {
                info!(
                    "structured import wrote {} categories, {} accounts, {} transactions, {} budgets",
                    imported.categories, imported.accounts, imported.transactions, imported.budgets
                );
                Ok(ImportReport {
                    success: true,
                    errors: Vec::new(),
                    imported,
                })
            }
            Err(err) => {
                warn!("structured import aborted mid-write: {}", err);
                Ok(ImportReport {
                    success: false,
                    errors: vec![ValidationError::general(format!("import failed: {}", err))],
                    imported,
                })
            }
        }
    }

    fn validate_batch(
        &self,
        batch: &ImportBatch,
        errors: &mut Vec<ValidationError>,
    ) -> ValidatedBatch {
        fn collect<T>(
            raws: &[Value],
            validate: impl Fn(&Value, i64) -> Result<T, Vec<ValidationError>>,
            errors: &mut Vec<ValidationError>,
        ) -> Vec<T> {
            raws.iter()
                .enumerate()
                .filter_map(|(row, raw)| match validate(raw, row as i64) {
                    Ok(payload) => Some(payload),
                    Err(mut row_errors) => {
                        errors.append(&mut row_errors);
                        None
                    }
                })
                .collect()
        }

        ValidatedBatch {
            categories: collect(&batch.categories, validate_category, errors),
            accounts: collect(&batch.accounts, validate_account, errors),
            transactions: collect(&batch.transactions, validate_transaction, errors),
            budgets: collect(&batch.budgets, validate_budget, errors),
        }
    }

    async fn write_batch(
        &self,
        batch: ValidatedBatch,
        imported: &mut ImportCounts,
    ) -> Result<()> {
        for category in batch.categories {
            self.documents.add_category(category).await?;
            imported.categories += 1;
        }
        for account in batch.accounts {
            self.documents.add_account(account).await?;
            imported.accounts += 1;
        }
        for transaction in batch.transactions {
            self.documents.add_transaction(transaction).await?;
            imported.transactions += 1;
        }
        for budget in batch.budgets {
            self.documents.add_budget(budget).await?;
            imported.budgets += 1;
        }
        Ok(())
    }

    /// Dump every stored document as a pretty-printed JSON array.
    pub async fn export_json(&self) -> Result<String> {
        let rows = self.engine.all_docs().await?;
        let docs: Vec<Value> = rows.into_iter().filter_map(|row| row.doc).collect();
        serde_json::to_string_pretty(&docs).context("failed to encode export")
    }

    /// Replay a previously exported JSON array straight through the engine.
    ///
    /// Documents keep their original ids and timestamps; nothing is
    /// validated. The first write failure aborts the replay.
    pub async fn import_json(&self, text: &str) -> Result<usize> {
        let docs: Vec<Value> =
            serde_json::from_str(text).context("export file is not a JSON array of documents")?;

        let mut written = 0;
        for doc in docs {
            self.engine
                .put(doc)
                .await
                .with_context(|| format!("replay aborted after {} documents", written))?;
            written += 1;
        }
        info!("replayed {} documents from export file", written);
        Ok(written)
    }
}
