//! Query layer: materialized reads and live subscriptions.
//!
//! One-shot reads answer "all documents of kind K" (optionally filtered or
//! date-ranged) as a fully ordered list. Live queries keep such a result
//! set current: a background task listens on the engine's change channel
//! and recomputes the full result after every committed write, publishing
//! through a watch channel. Recomputing on every write over-notifies but
//! can never miss a relevant one, which is the contract the UI depends on
//! for read-after-write consistency.

use crate::error::StoreError;
use crate::storage::{
    ChangeEvent, DocumentEngine, IndexKey, IndexName, QueryOptions, QueryRow,
};
use chrono::{DateTime, Utc};
use log::warn;
use shared::StoredDocument;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub struct QueryService<E> {
    engine: Arc<E>,
}

impl<E> Clone for QueryService<E> {
    fn clone(&self) -> Self {
        QueryService {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: DocumentEngine> QueryService<E> {
    pub fn new(engine: Arc<E>) -> Self {
        QueryService { engine }
    }

    /// Run one index read and decode the matching documents.
    pub async fn query(
        &self,
        index: IndexName,
        opts: QueryOptions,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let rows = self.engine.query(index, opts).await?;
        Ok(decode_rows(rows))
    }

    /// All transactions, newest first.
    pub async fn transactions(&self) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(
            IndexName::ByTypeAndDate,
            QueryOptions::key(IndexKey::text("transaction")).descending(),
        )
        .await
    }

    /// Transactions dated within `[start, end]`, oldest first.
    pub async fn transactions_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(IndexName::ByTypeAndDate, date_range_options(start, end))
            .await
    }

    /// Transactions in one category, newest first.
    pub async fn transactions_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(
            IndexName::ByCategoryAndDate,
            QueryOptions::key(IndexKey::text(category)).descending(),
        )
        .await
    }

    /// Transactions against one account, newest first.
    pub async fn transactions_by_account(
        &self,
        account: &str,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(
            IndexName::ByAccountAndDate,
            QueryOptions::key(IndexKey::text(account)).descending(),
        )
        .await
    }

    pub async fn categories(&self) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(IndexName::ByType, QueryOptions::key(IndexKey::text("category")))
            .await
    }

    pub async fn accounts(&self) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(IndexName::ByType, QueryOptions::key(IndexKey::text("account")))
            .await
    }

    pub async fn budgets(&self) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(IndexName::ByType, QueryOptions::key(IndexKey::text("budget")))
            .await
    }

    /// Budgets for one `YYYY-MM` period.
    pub async fn budgets_for_period(
        &self,
        period: &str,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(IndexName::ByPeriod, QueryOptions::key(IndexKey::text(period)))
            .await
    }

    /// Subscribe to a live view of one index read.
    ///
    /// The subscription is registered before the initial materialization so
    /// no write can slip between the first read and the first notification.
    pub fn live(&self, index: IndexName, opts: QueryOptions) -> LiveQuery {
        let engine = Arc::clone(&self.engine);
        let (tx, rx) = watch::channel(Vec::new());
        let mut changes = engine.subscribe();

        let task = tokio::spawn(async move {
            if !recompute(&engine, index, &opts, &tx).await {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(ChangeEvent { .. }) => {}
                    // Falling behind is fine: the next recompute reads the
                    // current state anyway.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if !recompute(&engine, index, &opts, &tx).await {
                    break;
                }
            }
        });

        LiveQuery { rx, task }
    }

    pub fn live_transactions(&self) -> LiveQuery {
        self.live(
            IndexName::ByTypeAndDate,
            QueryOptions::key(IndexKey::text("transaction")).descending(),
        )
    }

    pub fn live_transactions_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LiveQuery {
        self.live(IndexName::ByTypeAndDate, date_range_options(start, end))
    }

    pub fn live_categories(&self) -> LiveQuery {
        self.live(IndexName::ByType, QueryOptions::key(IndexKey::text("category")))
    }

    pub fn live_accounts(&self) -> LiveQuery {
        self.live(IndexName::ByType, QueryOptions::key(IndexKey::text("account")))
    }

    pub fn live_budgets(&self) -> LiveQuery {
        self.live(IndexName::ByType, QueryOptions::key(IndexKey::text("budget")))
    }
}

fn date_range_options(start: DateTime<Utc>, end: DateTime<Utc>) -> QueryOptions {
    QueryOptions::range(
        IndexKey::text("transaction").instant(start.timestamp_millis()),
        IndexKey::text("transaction").instant(end.timestamp_millis()),
    )
}

/// Re-run the query and publish the fresh result set.
/// Returns false once every receiver is gone and the task should stop.
async fn recompute<E: DocumentEngine>(
    engine: &Arc<E>,
    index: IndexName,
    opts: &QueryOptions,
    tx: &watch::Sender<Vec<StoredDocument>>,
) -> bool {
    match engine.query(index, opts.clone()).await {
        Ok(rows) => tx.send(decode_rows(rows)).is_ok(),
        Err(err) => {
            warn!("live query recompute failed: {}", err);
            !tx.is_closed()
        }
    }
}

fn decode_rows(rows: Vec<QueryRow>) -> Vec<StoredDocument> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row.doc) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!("skipping undecodable document {}: {}", row.id, err);
                None
            }
        })
        .collect()
}

/// Handle for a live query subscription.
///
/// Holds the receiving end of the watch channel plus the background task
/// that feeds it; dropping the handle tears the task down.
pub struct LiveQuery {
    rx: watch::Receiver<Vec<StoredDocument>>,
    task: JoinHandle<()>,
}

impl LiveQuery {
    /// Snapshot of the most recently published result set.
    pub fn results(&self) -> Vec<StoredDocument> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published result set. Returns false when the
    /// publishing task has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::documents::DocumentService;
    use crate::storage::MemoryEngine;
    use chrono::TimeZone;
    use shared::Transaction;

    fn setup() -> (DocumentService<MemoryEngine>, QueryService<MemoryEngine>) {
        let engine = Arc::new(MemoryEngine::new());
        (
            DocumentService::new(Arc::clone(&engine)),
            QueryService::new(engine),
        )
    }

    fn tx_on(date: DateTime<Utc>, description: &str) -> Transaction {
        Transaction {
            date,
            amount: 10.0,
            category: "Food".to_string(),
            account: "Checking".to_string(),
            description: description.to_string(),
            is_expense: true,
            tags: None,
            subcategory: None,
        }
    }

    #[tokio::test]
    async fn transactions_come_back_newest_first() {
        let (documents, queries) = setup();
        for (month, name) in [(1, "jan"), (2, "feb"), (3, "mar")] {
            documents
                .add_transaction(tx_on(
                    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
                    name,
                ))
                .await
                .unwrap();
        }

        let docs = queries.transactions().await.unwrap();
        let names: Vec<&str> = docs
            .iter()
            .map(|d| d.as_transaction().unwrap().description.as_str())
            .collect();
        assert_eq!(names, vec!["mar", "feb", "jan"]);
    }

    #[tokio::test]
    async fn date_range_read_is_bounded() {
        let (documents, queries) = setup();
        for month in 1..=3 {
            documents
                .add_transaction(tx_on(
                    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap(),
                    "tx",
                ))
                .await
                .unwrap();
        }

        let docs = queries
            .transactions_by_date_range(
                Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].as_transaction().unwrap().date,
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn by_type_reads_do_not_mix_kinds() {
        let (documents, queries) = setup();
        documents
            .add_transaction(tx_on(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), "tx"))
            .await
            .unwrap();
        documents
            .add_category(shared::Category {
                name: "Food".to_string(),
                color: "#4CAF50".to_string(),
                icon: "utensils".to_string(),
                parent: None,
                subcategories: None,
            })
            .await
            .unwrap();

        let categories = queries.categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].as_category().unwrap().name, "Food");

        assert!(queries.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn budgets_filter_by_period() {
        let (documents, queries) = setup();
        for period in ["2024-02", "2024-03"] {
            documents
                .add_budget(shared::Budget {
                    category: "Food".to_string(),
                    amount: 500.0,
                    period: period.to_string(),
                })
                .await
                .unwrap();
        }

        let docs = queries.budgets_for_period("2024-03").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].as_budget().unwrap().period, "2024-03");
    }

    #[tokio::test]
    async fn live_query_delivers_writes_without_repolling() {
        let (documents, queries) = setup();
        let mut live = queries.live_transactions();

        // Initial materialization of the empty store.
        assert!(live.changed().await);
        assert!(live.results().is_empty());

        documents
            .add_transaction(tx_on(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), "new"))
            .await
            .unwrap();

        assert!(live.changed().await);
        let docs = live.results();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].as_transaction().unwrap().description, "new");
    }

    #[tokio::test]
    async fn live_query_observes_deletes() {
        let (documents, queries) = setup();
        let stored = documents
            .add_transaction(tx_on(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), "tx"))
            .await
            .unwrap();

        let mut live = queries.live_transactions();
        assert!(live.changed().await);
        assert_eq!(live.results().len(), 1);

        documents.delete_transaction(&stored.id).await.unwrap();
        assert!(live.changed().await);
        assert!(live.results().is_empty());
    }
}
