//! Type-tagged secondary indexes.
//!
//! Each stored document maps to zero or more sortable index keys. Engines
//! evaluate reads by mapping every document through the requested index and
//! filtering against the caller's key or range; [`run_query`] implements
//! that shared scan so every engine answers queries identically.

use chrono::DateTime;
use serde_json::Value;

/// The named indexes the query layer can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    /// `[type]` for every document
    ByType,
    /// `[type, date-millis]` for transactions, `[type]` for everything else
    ByTypeAndDate,
    /// `[category, date-millis]`, transactions only
    ByCategoryAndDate,
    /// `[account, date-millis]`, transactions only
    ByAccountAndDate,
    /// `[period]`, budgets only
    ByPeriod,
}

/// One component of an index key.
///
/// Variant order matters for the derived ordering; components within a
/// single index position are always homogeneous, so cross-variant
/// comparisons only arise between keys of different arities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyComponent {
    Text(String),
    /// Epoch milliseconds, the sortable form of a calendar instant
    Instant(i64),
}

/// A sortable composite key derived from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey(pub Vec<KeyComponent>);

impl IndexKey {
    /// Single text component key.
    pub fn text(value: impl Into<String>) -> Self {
        IndexKey(vec![KeyComponent::Text(value.into())])
    }

    /// Append an instant component, consuming and returning the key.
    pub fn instant(mut self, millis: i64) -> Self {
        self.0.push(KeyComponent::Instant(millis));
        self
    }

    /// True when `prefix`'s components lead this key.
    pub fn starts_with(&self, prefix: &IndexKey) -> bool {
        prefix.0.len() <= self.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

/// Options for a keyed or ranged index read.
///
/// `key` matches as a prefix of the index key, so `["transaction"]` selects
/// every `[type, date]` entry for transactions. Ranges are inclusive on both
/// bounds. `descending` flips the key ordering of the result.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub key: Option<IndexKey>,
    pub range: Option<(IndexKey, IndexKey)>,
    pub descending: bool,
}

impl QueryOptions {
    pub fn key(key: IndexKey) -> Self {
        QueryOptions {
            key: Some(key),
            ..Default::default()
        }
    }

    pub fn range(start: IndexKey, end: IndexKey) -> Self {
        QueryOptions {
            range: Some((start, end)),
            ..Default::default()
        }
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

/// One matching row of an index read.
#[derive(Debug, Clone)]
pub struct QueryRow {
    pub key: IndexKey,
    pub id: String,
    pub doc: Value,
}

fn text_field<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn date_millis(doc: &Value) -> Option<i64> {
    let raw = doc.get("date")?.as_str()?;
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    Some(parsed.timestamp_millis())
}

/// Map a document to its keys within one index.
///
/// Documents that do not participate in an index (wrong kind, missing
/// fields) map to no keys and are invisible to reads of that index.
pub fn map_document(index: IndexName, doc: &Value) -> Vec<IndexKey> {
    let doc_type = match text_field(doc, "type") {
        Some(t) => t,
        None => return Vec::new(),
    };

    match index {
        IndexName::ByType => vec![IndexKey::text(doc_type)],
        IndexName::ByTypeAndDate => {
            if doc_type == "transaction" {
                if let Some(millis) = date_millis(doc) {
                    return vec![IndexKey::text(doc_type).instant(millis)];
                }
            }
            // Non-transactions still index under their bare type so the
            // same index answers plain by-type reads.
            vec![IndexKey::text(doc_type)]
        }
        IndexName::ByCategoryAndDate => {
            match (doc_type, text_field(doc, "category"), date_millis(doc)) {
                ("transaction", Some(category), Some(millis)) => {
                    vec![IndexKey::text(category).instant(millis)]
                }
                _ => Vec::new(),
            }
        }
        IndexName::ByAccountAndDate => {
            match (doc_type, text_field(doc, "account"), date_millis(doc)) {
                ("transaction", Some(account), Some(millis)) => {
                    vec![IndexKey::text(account).instant(millis)]
                }
                _ => Vec::new(),
            }
        }
        IndexName::ByPeriod => match (doc_type, text_field(doc, "period")) {
            ("budget", Some(period)) => vec![IndexKey::text(period)],
            _ => Vec::new(),
        },
    }
}

fn matches(key: &IndexKey, opts: &QueryOptions) -> bool {
    if let Some(wanted) = &opts.key {
        if !key.starts_with(wanted) {
            return false;
        }
    }
    if let Some((start, end)) = &opts.range {
        if key < start || key > end {
            return false;
        }
    }
    true
}

/// Evaluate an index read over an enumeration of `(id, document)` pairs.
///
/// Rows come back sorted by key in the requested direction; rows with equal
/// keys keep a stable relative order.
pub fn run_query(
    docs: impl IntoIterator<Item = (String, Value)>,
    index: IndexName,
    opts: &QueryOptions,
) -> Vec<QueryRow> {
    let mut rows = Vec::new();
    for (id, doc) in docs {
        for key in map_document(index, &doc) {
            if matches(&key, opts) {
                rows.push(QueryRow {
                    key,
                    id: id.clone(),
                    doc: doc.clone(),
                });
            }
        }
    }

    rows.sort_by(|a, b| {
        let ord = a.key.cmp(&b.key);
        if opts.descending {
            ord.reverse()
        } else {
            ord
        }
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str, date: &str, category: &str, account: &str) -> (String, Value) {
        (
            id.to_string(),
            json!({
                "id": id,
                "type": "transaction",
                "date": date,
                "amount": 10.0,
                "category": category,
                "account": account,
                "description": "",
                "isExpense": true,
            }),
        )
    }

    #[test]
    fn transactions_key_by_type_and_date() {
        let (_, doc) = tx("t1", "2024-01-01T00:00:00Z", "Food", "Checking");
        let keys = map_document(IndexName::ByTypeAndDate, &doc);
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with(&IndexKey::text("transaction")));
        assert_eq!(keys[0].0.len(), 2);
    }

    #[test]
    fn non_transactions_fall_back_to_bare_type_key() {
        let doc = json!({"id": "c1", "type": "category", "name": "Food"});
        assert_eq!(
            map_document(IndexName::ByTypeAndDate, &doc),
            vec![IndexKey::text("category")]
        );
        assert!(map_document(IndexName::ByCategoryAndDate, &doc).is_empty());
    }

    #[test]
    fn budgets_key_by_period() {
        let doc = json!({"id": "b1", "type": "budget", "category": "Food", "amount": 500.0, "period": "2024-03"});
        assert_eq!(
            map_document(IndexName::ByPeriod, &doc),
            vec![IndexKey::text("2024-03")]
        );
        assert!(map_document(IndexName::ByCategoryAndDate, &doc).is_empty());
    }

    #[test]
    fn descending_query_orders_newest_first() {
        let docs = vec![
            tx("t1", "2024-01-01T00:00:00Z", "Food", "Checking"),
            tx("t2", "2024-02-01T00:00:00Z", "Food", "Checking"),
            tx("t3", "2024-03-01T00:00:00Z", "Food", "Checking"),
        ];

        let rows = run_query(
            docs,
            IndexName::ByTypeAndDate,
            &QueryOptions::key(IndexKey::text("transaction")).descending(),
        );
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn range_query_is_inclusive_and_bounded() {
        let docs = vec![
            tx("t1", "2024-01-01T00:00:00Z", "Food", "Checking"),
            tx("t2", "2024-02-01T00:00:00Z", "Food", "Checking"),
            tx("t3", "2024-03-01T00:00:00Z", "Food", "Checking"),
        ];

        let start = DateTime::parse_from_rfc3339("2024-01-15T00:00:00Z")
            .unwrap()
            .timestamp_millis();
        let end = DateTime::parse_from_rfc3339("2024-02-15T00:00:00Z")
            .unwrap()
            .timestamp_millis();

        let rows = run_query(
            docs,
            IndexName::ByTypeAndDate,
            &QueryOptions::range(
                IndexKey::text("transaction").instant(start),
                IndexKey::text("transaction").instant(end),
            ),
        );
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["t2"]);
    }

    #[test]
    fn category_index_groups_by_name() {
        let docs = vec![
            tx("t1", "2024-01-01T00:00:00Z", "Food", "Checking"),
            tx("t2", "2024-02-01T00:00:00Z", "Transport", "Checking"),
        ];

        let rows = run_query(
            docs,
            IndexName::ByCategoryAndDate,
            &QueryOptions::key(IndexKey::text("Food")),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "t1");
    }
}
