//! Database-wide bulk operations: clear everything, repopulate with the
//! starter dataset. Both are safe to call repeatedly and shrug off
//! individual document failures; only a failure to enumerate the store at
//! all propagates as an error.

use crate::domain::documents::DocumentService;
use crate::storage::DocumentEngine;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use log::{info, warn};
use shared::{Account, Budget, Category, Transaction};
use std::sync::Arc;
use std::time::Duration;

/// Deletions fire concurrently within one batch, sequentially across
/// batches, to avoid hammering the engine with one giant burst.
const DELETE_BATCH_SIZE: usize = 10;

/// Pause between clearing and repopulating, giving the engine time to
/// settle its change notifications.
const REPOPULATE_SETTLE: Duration = Duration::from_millis(250);

pub struct DataManagementService<E> {
    engine: Arc<E>,
    documents: DocumentService<E>,
}

impl<E> Clone for DataManagementService<E> {
    fn clone(&self) -> Self {
        DataManagementService {
            engine: Arc::clone(&self.engine),
            documents: self.documents.clone(),
        }
    }
}

impl<E: DocumentEngine> DataManagementService<E> {
    pub fn new(engine: Arc<E>, documents: DocumentService<E>) -> Self {
        DataManagementService { engine, documents }
    }

    /// Delete every stored document.
    ///
    /// Individual deletion failures are logged and skipped; the pass keeps
    /// going and still reports success. Afterwards the store is
    /// re-enumerated and any survivors are logged as a warning.
    pub async fn clear_database(&self) -> Result<bool> {
        let ids: Vec<String> = self
            .engine
            .all_docs()
            .await?
            .into_iter()
            .map(|row| row.key)
            .collect();
        info!("clearing database: {} documents", ids.len());

        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            let deletions = join_all(batch.iter().map(|id| self.engine.del(id))).await;
            for (id, outcome) in batch.iter().zip(deletions) {
                if let Err(err) = outcome {
                    warn!("failed to delete {}: {}", id, err);
                }
            }
        }

        match self.engine.all_docs().await {
            Ok(rows) if rows.is_empty() => info!("database cleared"),
            Ok(rows) => warn!("{} documents remain after clearing", rows.len()),
            Err(err) => warn!("could not verify cleared database: {}", err),
        }
        Ok(true)
    }

    /// Wipe the store if needed, then insert the starter dataset:
    /// categories, accounts, a few transactions, and budgets for the
    /// current period. Returns true when the store holds at least one
    /// document afterwards.
    pub async fn populate_test_data(&self) -> Result<bool> {
        let existing = self.engine.all_docs().await?;
        if !existing.is_empty() {
            info!(
                "store holds {} documents, clearing before repopulating",
                existing.len()
            );
            self.clear_database().await?;
            tokio::time::sleep(REPOPULATE_SETTLE).await;
        }

        for category in starter_categories() {
            if let Err(err) = self.documents.add_category(category).await {
                warn!("failed to insert starter category: {}", err);
            }
        }
        for account in starter_accounts() {
            if let Err(err) = self.documents.add_account(account).await {
                warn!("failed to insert starter account: {}", err);
            }
        }
        for transaction in starter_transactions() {
            if let Err(err) = self.documents.add_transaction(transaction).await {
                warn!("failed to insert starter transaction: {}", err);
            }
        }
        let period = Utc::now().format("%Y-%m").to_string();
        for budget in starter_budgets(&period) {
            if let Err(err) = self.documents.add_budget(budget).await {
                warn!("failed to insert starter budget: {}", err);
            }
        }

        let after = self.engine.all_docs().await?;
        info!("populated starter data: {} documents", after.len());
        Ok(!after.is_empty())
    }
}

fn starter_categories() -> Vec<Category> {
    let entries = [
        ("Food", "#4CAF50", "utensils"),
        ("Transport", "#2196F3", "car"),
        ("Shopping", "#9C27B0", "shopping-bag"),
        ("Salary", "#FF9800", "briefcase"),
    ];
    entries
        .into_iter()
        .map(|(name, color, icon)| Category {
            name: name.to_string(),
            color: color.to_string(),
            icon: icon.to_string(),
            parent: None,
            subcategories: None,
        })
        .collect()
}

fn starter_accounts() -> Vec<Account> {
    let entries = [
        ("Checking", 1000.0, "bank", "#2196F3"),
        ("Savings", 5000.0, "piggy-bank", "#4CAF50"),
        ("Credit Card", 0.0, "credit-card", "#F44336"),
    ];
    entries
        .into_iter()
        .map(|(name, initial_balance, icon, color)| Account {
            name: name.to_string(),
            initial_balance,
            icon: icon.to_string(),
            color: color.to_string(),
        })
        .collect()
}

fn starter_transactions() -> Vec<Transaction> {
    let now = Utc::now();
    vec![
        Transaction {
            date: now - ChronoDuration::days(3),
            amount: 45.67,
            category: "Food".to_string(),
            account: "Checking".to_string(),
            description: "Grocery shopping".to_string(),
            is_expense: true,
            tags: Some(vec!["essential".to_string(), "groceries".to_string()]),
            subcategory: Some("Groceries".to_string()),
        },
        Transaction {
            date: now - ChronoDuration::days(2),
            amount: 1200.0,
            category: "Salary".to_string(),
            account: "Savings".to_string(),
            description: "Monthly salary".to_string(),
            is_expense: false,
            tags: Some(vec!["income".to_string(), "salary".to_string()]),
            subcategory: None,
        },
        Transaction {
            date: now - ChronoDuration::days(1),
            amount: 89.99,
            category: "Shopping".to_string(),
            account: "Credit Card".to_string(),
            description: "New shoes".to_string(),
            is_expense: true,
            tags: Some(vec!["clothing".to_string()]),
            subcategory: Some("Shoes".to_string()),
        },
    ]
}

fn starter_budgets(period: &str) -> Vec<Budget> {
    let entries = [("Food", 500.0), ("Transport", 300.0), ("Shopping", 400.0)];
    entries
        .into_iter()
        .map(|(category, amount)| Budget {
            category: category.to_string(),
            amount,
            period: period.to_string(),
        })
        .collect()
}
