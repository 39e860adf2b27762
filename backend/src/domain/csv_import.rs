//! CSV import pipeline.
//!
//! Turns an uploaded CSV file into validated, persisted documents of one
//! declared kind. Each row is validated and coerced independently; a bad
//! row records an error and the import moves on, so a single typo never
//! sinks a whole statement export. Also generates the per-kind sample
//! templates offered as download guidance in the UI.

use crate::domain::documents::DocumentService;
use crate::domain::validation::{
    parse_instant, DEFAULT_ACCOUNT_ICON, DEFAULT_CATEGORY_ICON, DEFAULT_COLOR,
};
use crate::storage::DocumentEngine;
use anyhow::Result;
use csv::StringRecord;
use log::info;
use shared::{Account, Budget, Category, DocumentData, DocumentKind, Transaction};
use std::io::Read;

/// Outcome of one CSV import run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvImportResult {
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct CsvImportService<E> {
    documents: DocumentService<E>,
}

impl<E> Clone for CsvImportService<E> {
    fn clone(&self) -> Self {
        CsvImportService {
            documents: self.documents.clone(),
        }
    }
}

impl<E: DocumentEngine> CsvImportService<E> {
    pub fn new(documents: DocumentService<E>) -> Self {
        CsvImportService { documents }
    }

    /// Import a header-keyed CSV file as documents of `kind`.
    ///
    /// Every row is processed even when every row fails; only a failure to
    /// read the file itself aborts the run.
    pub async fn import_csv<R: Read>(
        &self,
        reader: R,
        kind: DocumentKind,
    ) -> Result<CsvImportResult> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut result = CsvImportResult::default();
        for (index, record) in csv_reader.records().enumerate() {
            let row = index + 1;
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    result.failed += 1;
                    result.errors.push(format!("row {}: {}", row, err));
                    continue;
                }
            };

            match parse_row(kind, &headers, &record) {
                Ok(data) => match self.persist(data).await {
                    Ok(()) => result.successful += 1,
                    Err(err) => {
                        result.failed += 1;
                        result.errors.push(format!("row {}: {}", row, err));
                    }
                },
                Err(message) => {
                    result.failed += 1;
                    result.errors.push(format!("row {}: {}", row, message));
                }
            }
        }

        info!(
            "csv import of {}s finished: {} imported, {} failed",
            kind, result.successful, result.failed
        );
        Ok(result)
    }

    async fn persist(&self, data: DocumentData) -> Result<(), crate::error::StoreError> {
        match data {
            DocumentData::Transaction(tx) => self.documents.add_transaction(tx).await.map(|_| ()),
            DocumentData::Category(cat) => self.documents.add_category(cat).await.map(|_| ()),
            DocumentData::Account(acct) => self.documents.add_account(acct).await.map(|_| ()),
            DocumentData::Budget(budget) => self.documents.add_budget(budget).await.map(|_| ()),
        }
    }
}

fn field<'a>(headers: &StringRecord, record: &'a StringRecord, name: &str) -> Option<&'a str> {
    let position = headers.iter().position(|h| h == name)?;
    record.get(position).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_row(
    kind: DocumentKind,
    headers: &StringRecord,
    record: &StringRecord,
) -> Result<DocumentData, String> {
    let get = |name: &str| field(headers, record, name);

    match kind {
        DocumentKind::Transaction => {
            let date = get("date")
                .and_then(parse_instant)
                .ok_or("date is required and must be a valid instant")?;
            let amount = get("amount")
                .ok_or("amount is required")?
                .parse::<f64>()
                .map_err(|_| "amount must be a valid number")?;
            let category = get("category").ok_or("category is required")?.to_string();
            let account = get("account").ok_or("account is required")?.to_string();
            // Anything but the literal "true" reads as income, matching the
            // historical import behavior.
            let is_expense = get("isExpense") == Some("true");
            let tags = get("tags").map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            });

            Ok(DocumentData::Transaction(Transaction {
                date,
                amount,
                category,
                account,
                description: get("description").unwrap_or_default().to_string(),
                is_expense,
                tags,
                subcategory: get("subcategory").map(str::to_string),
            }))
        }
        DocumentKind::Category => Ok(DocumentData::Category(Category {
            name: get("name").ok_or("name is required")?.to_string(),
            color: get("color").unwrap_or(DEFAULT_COLOR).to_string(),
            icon: get("icon").unwrap_or(DEFAULT_CATEGORY_ICON).to_string(),
            parent: None,
            subcategories: None,
        })),
        DocumentKind::Account => {
            let initial_balance = match get("initialBalance") {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| "initialBalance must be a valid number")?,
                None => 0.0,
            };
            Ok(DocumentData::Account(Account {
                name: get("name").ok_or("name is required")?.to_string(),
                initial_balance,
                icon: get("icon").unwrap_or(DEFAULT_ACCOUNT_ICON).to_string(),
                color: get("color").unwrap_or(DEFAULT_COLOR).to_string(),
            }))
        }
        DocumentKind::Budget => {
            let amount = get("amount")
                .ok_or("amount is required")?
                .parse::<f64>()
                .map_err(|_| "amount must be a valid number")?;
            Ok(DocumentData::Budget(Budget {
                category: get("category").ok_or("category is required")?.to_string(),
                amount,
                period: get("period").ok_or("period is required")?.to_string(),
            }))
        }
    }
}

/// Sample CSV template for one document kind: header row plus a few
/// representative data rows. Guidance only, nothing validates against it.
pub fn sample_csv(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Transaction => {
            "date,amount,category,account,description,isExpense,tags,subcategory\n\
             2024-03-15,45.67,Food,Checking,Grocery shopping,true,\"essential,groceries\",Groceries\n\
             2024-03-16,1200.00,Salary,Savings,Monthly salary,false,\"income,salary\",\n\
             2024-03-17,89.99,Shopping,Credit Card,New shoes,true,\"clothing\",Shoes"
        }
        DocumentKind::Category => {
            "name,color,icon\n\
             Food,#4CAF50,utensils\n\
             Transport,#2196F3,car\n\
             Shopping,#9C27B0,shopping-bag"
        }
        DocumentKind::Account => {
            "name,initialBalance,icon,color\n\
             Checking,1000,bank,#2196F3\n\
             Savings,5000,piggy-bank,#4CAF50\n\
             Credit Card,0,credit-card,#F44336"
        }
        DocumentKind::Budget => {
            "category,amount,period\n\
             Food,500,2024-03\n\
             Transport,300,2024-03\n\
             Shopping,400,2024-03"
        }
    }
}
