//! Document model shared across the SpendSage backend.
//!
//! Every persisted record is a JSON document carrying a common envelope
//! (`id`, `type`, `createdAt`, `updatedAt`) plus the fields of one of four
//! document kinds. The JSON field names are camelCase so exports stay
//! compatible with files produced by earlier versions of the app.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminant for the four persisted document shapes.
///
/// The kind is immutable after creation and decides which secondary indexes
/// a document participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Transaction,
    Category,
    Account,
    Budget,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Transaction => "transaction",
            DocumentKind::Category => "category",
            DocumentKind::Account => "account",
            DocumentKind::Budget => "budget",
        }
    }

    /// Generate a document ID encoding the kind and creation instant.
    /// Format: `<kind>:<RFC 3339 timestamp>`, fixed-width nanosecond
    /// precision so ids of one kind sort lexicographically by creation.
    /// Example: `transaction:2024-03-15T10:23:45.123456789Z`
    pub fn generate_id(&self, instant: DateTime<Utc>) -> String {
        format!(
            "{}:{}",
            self.as_str(),
            instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction" => Ok(DocumentKind::Transaction),
            "category" => Ok(DocumentKind::Category),
            "account" => Ok(DocumentKind::Account),
            "budget" => Ok(DocumentKind::Budget),
            other => Err(format!("unknown document kind: {}", other)),
        }
    }
}

/// Split a document ID back into its kind and creation instant.
///
/// Returns `None` for ids that were not produced by [`DocumentKind::generate_id`].
pub fn parse_id(id: &str) -> Option<(DocumentKind, DateTime<Utc>)> {
    let (kind, instant) = id.split_once(':')?;
    let kind = DocumentKind::from_str(kind).ok()?;
    let instant = DateTime::parse_from_rfc3339(instant).ok()?;
    Some((kind, instant.with_timezone(&Utc)))
}

/// A single money movement against an account.
///
/// `category` and `account` are free-text name references, not foreign keys.
/// A transaction whose category no longer exists simply renders as
/// uncategorized; the store never rejects dangling references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// When the money moved (distinct from when the record was created)
    pub date: DateTime<Utc>,
    /// Non-negative magnitude; sign comes from `is_expense`
    pub amount: f64,
    pub category: String,
    pub account: String,
    pub description: String,
    pub is_expense: bool,
    /// Free-text labels; omitted entirely from the stored JSON when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

/// A spending category. Names are unique by convention only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    /// Hex color string, e.g. `#2196F3`
    pub color: String,
    pub icon: String,
    /// Parent category name for one level of hierarchy.
    /// Serialized as an explicit `null` when absent.
    pub parent: Option<String>,
    /// Allowed child names, when this category acts as a parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<String>>,
}

/// A financial account (cash, bank account, credit card, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    /// Signed baseline balance before any transactions are applied
    pub initial_balance: f64,
    pub icon: String,
    pub color: String,
}

/// A monthly spending ceiling for one category.
///
/// Nothing enforces uniqueness per (category, period); duplicate budgets for
/// the same pair can coexist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub category: String,
    pub amount: f64,
    /// Year-month the budget applies to, format `YYYY-MM`
    pub period: String,
}

/// The kind-specific portion of a document, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentData {
    Transaction(Transaction),
    Category(Category),
    Account(Account),
    Budget(Budget),
}

impl DocumentData {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentData::Transaction(_) => DocumentKind::Transaction,
            DocumentData::Category(_) => DocumentKind::Category,
            DocumentData::Account(_) => DocumentKind::Account,
            DocumentData::Budget(_) => DocumentKind::Budget,
        }
    }
}

/// A document as it exists in the store: envelope plus kind-specific fields,
/// flattened into one JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    #[serde(flatten)]
    pub data: DocumentData,
    /// Set once at creation, never mutated
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful write
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn kind(&self) -> DocumentKind {
        self.data.kind()
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match &self.data {
            DocumentData::Transaction(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match &self.data {
            DocumentData::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_account(&self) -> Option<&Account> {
        match &self.data {
            DocumentData::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_budget(&self) -> Option<&Budget> {
        match &self.data {
            DocumentData::Budget(b) => Some(b),
            _ => None,
        }
    }
}

/// Partial update for a transaction. `None` fields leave the stored value
/// untouched; only present fields are serialized and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expense: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

/// Partial update for a category.
///
/// `parent` is doubly optional: `None` leaves it untouched, `Some(None)`
/// explicitly clears it to `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<String>>,
}

/// Partial update for an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Partial update for a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}
