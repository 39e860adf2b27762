//! Per-kind document validators.
//!
//! Each validator is a pure function from a raw JSON value to a typed
//! payload, collecting every field problem instead of stopping at the
//! first. The batch import path runs these over a whole file before a
//! single write happens.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use shared::{Account, Budget, Category, Transaction};

pub(crate) static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern"));
pub(crate) static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("period pattern"));

pub(crate) const DEFAULT_COLOR: &str = "#2196F3";
pub(crate) const DEFAULT_CATEGORY_ICON: &str = "folder";
pub(crate) const DEFAULT_ACCOUNT_ICON: &str = "bank";

/// One field-level problem in a batch, addressed by row index within its
/// collection. Row `-1` marks a general, non-row-scoped failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub row: i64,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(row: i64, field: &str, raw: &Value, message: impl Into<String>) -> Self {
        let value = match raw.get(field) {
            Some(v) => v.to_string(),
            None => "missing".to_string(),
        };
        ValidationError {
            row,
            field: field.to_string(),
            value,
            message: message.into(),
        }
    }

    /// A batch-wide failure not tied to any row.
    pub fn general(message: impl Into<String>) -> Self {
        ValidationError {
            row: -1,
            field: "general".to_string(),
            value: String::new(),
            message: message.into(),
        }
    }
}

fn required_string(
    raw: &Value,
    field: &str,
    row: i64,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    match raw.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Some(s.to_string()),
        _ => {
            errors.push(ValidationError::new(
                row,
                field,
                raw,
                format!("{} is required", field),
            ));
            None
        }
    }
}

fn optional_string(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(raw: &Value, field: &str) -> Option<Vec<String>> {
    raw.get(field).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Parse a calendar instant from either RFC 3339 or a bare `YYYY-MM-DD`.
pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

pub fn validate_category(raw: &Value, row: i64) -> Result<Category, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = required_string(raw, "name", row, &mut errors);

    let color = match raw.get("color").and_then(Value::as_str) {
        Some(color) if COLOR_RE.is_match(color) => color.to_string(),
        Some(_) => {
            errors.push(ValidationError::new(
                row,
                "color",
                raw,
                "color must be a hex string like #2196F3",
            ));
            String::new()
        }
        None => DEFAULT_COLOR.to_string(),
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Category {
        name: name.expect("validated"),
        color,
        icon: optional_string(raw, "icon").unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
        parent: optional_string(raw, "parent"),
        subcategories: string_list(raw, "subcategories"),
    })
}

pub fn validate_account(raw: &Value, row: i64) -> Result<Account, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = required_string(raw, "name", row, &mut errors);

    let initial_balance = match raw.get("initialBalance").and_then(Value::as_f64) {
        Some(balance) => balance,
        None => {
            errors.push(ValidationError::new(
                row,
                "initialBalance",
                raw,
                "initialBalance must be a number",
            ));
            0.0
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Account {
        name: name.expect("validated"),
        initial_balance,
        icon: optional_string(raw, "icon").unwrap_or_else(|| DEFAULT_ACCOUNT_ICON.to_string()),
        color: optional_string(raw, "color").unwrap_or_else(|| DEFAULT_COLOR.to_string()),
    })
}

pub fn validate_transaction(raw: &Value, row: i64) -> Result<Transaction, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let date = match raw.get("date").and_then(Value::as_str).and_then(parse_instant) {
        Some(date) => Some(date),
        None => {
            errors.push(ValidationError::new(
                row,
                "date",
                raw,
                "date is required and must be a valid instant",
            ));
            None
        }
    };

    let amount = match raw.get("amount").and_then(Value::as_f64) {
        Some(amount) => amount,
        None => {
            errors.push(ValidationError::new(
                row,
                "amount",
                raw,
                "amount must be a valid number",
            ));
            0.0
        }
    };

    let category = required_string(raw, "category", row, &mut errors);
    let account = required_string(raw, "account", row, &mut errors);

    let is_expense = match raw.get("isExpense").and_then(Value::as_bool) {
        Some(flag) => flag,
        None => {
            errors.push(ValidationError::new(
                row,
                "isExpense",
                raw,
                "isExpense must be a boolean",
            ));
            false
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Transaction {
        date: date.expect("validated"),
        amount,
        category: category.expect("validated"),
        account: account.expect("validated"),
        description: optional_string(raw, "description").unwrap_or_default(),
        is_expense,
        tags: string_list(raw, "tags"),
        subcategory: optional_string(raw, "subcategory"),
    })
}

pub fn validate_budget(raw: &Value, row: i64) -> Result<Budget, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let category = required_string(raw, "category", row, &mut errors);

    let amount = match raw.get("amount").and_then(Value::as_f64) {
        Some(amount) => amount,
        None => {
            errors.push(ValidationError::new(
                row,
                "amount",
                raw,
                "amount must be a valid number",
            ));
            0.0
        }
    };

    let period = match raw.get("period").and_then(Value::as_str) {
        Some(period) if PERIOD_RE.is_match(period) => period.to_string(),
        _ => {
            errors.push(ValidationError::new(
                row,
                "period",
                raw,
                "period is required in YYYY-MM format",
            ));
            String::new()
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Budget {
        category: category.expect("validated"),
        amount,
        period,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_requires_name_and_well_formed_color() {
        let errors = validate_category(&json!({"color": "#4CAF50"}), 0).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[0].value, "missing");

        let errors = validate_category(&json!({"name": "Food", "color": "green"}), 2).unwrap_err();
        assert_eq!(errors[0].field, "color");
        assert_eq!(errors[0].row, 2);

        let category = validate_category(&json!({"name": "Food"}), 0).unwrap();
        assert_eq!(category.color, DEFAULT_COLOR);
        assert_eq!(category.icon, DEFAULT_CATEGORY_ICON);
        assert_eq!(category.parent, None);
    }

    #[test]
    fn account_balance_must_be_numeric() {
        let errors =
            validate_account(&json!({"name": "Checking", "initialBalance": "lots"}), 0)
                .unwrap_err();
        assert_eq!(errors[0].field, "initialBalance");

        let account =
            validate_account(&json!({"name": "Checking", "initialBalance": 1000.0}), 0).unwrap();
        assert_eq!(account.initial_balance, 1000.0);
        assert_eq!(account.icon, DEFAULT_ACCOUNT_ICON);
    }

    #[test]
    fn transaction_collects_every_field_error() {
        let errors = validate_transaction(
            &json!({"date": "not-a-date", "amount": "ten", "isExpense": "yes"}),
            4,
        )
        .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["date", "amount", "category", "account", "isExpense"]);
        assert!(errors.iter().all(|e| e.row == 4));
    }

    #[test]
    fn transaction_accepts_date_only_instants() {
        let tx = validate_transaction(
            &json!({
                "date": "2024-03-15",
                "amount": 45.67,
                "category": "Food",
                "account": "Checking",
                "isExpense": true,
            }),
            0,
        )
        .unwrap();
        assert_eq!(tx.date.to_rfc3339(), "2024-03-15T00:00:00+00:00");
        assert_eq!(tx.description, "");
        assert_eq!(tx.tags, None);
    }

    #[test]
    fn budget_period_format_is_enforced() {
        let errors = validate_budget(
            &json!({"category": "Food", "amount": 500.0, "period": "2024/03"}),
            0,
        )
        .unwrap_err();
        assert_eq!(errors[0].field, "period");

        let budget = validate_budget(
            &json!({"category": "Food", "amount": 500.0, "period": "2024-03"}),
            0,
        )
        .unwrap();
        assert_eq!(budget.period, "2024-03");
    }

    #[test]
    fn is_expense_must_be_strictly_boolean() {
        let raw = json!({
            "date": "2024-03-15",
            "amount": 1.0,
            "category": "Food",
            "account": "Checking",
            "isExpense": "true",
        });
        let errors = validate_transaction(&raw, 0).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "isExpense");
    }
}
