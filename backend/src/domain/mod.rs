//! # Domain Module
//!
//! Business logic over the storage layer: the document store facade, the
//! query/live-query layer, validation, and the bulk import/export and
//! maintenance services. Everything here works against the
//! [`DocumentEngine`](crate::storage::DocumentEngine) abstraction and is
//! exercised in tests with the in-memory engine.

pub mod csv_import;
pub mod data_exchange;
pub mod data_management;
pub mod documents;
pub mod queries;
pub mod validation;

pub use csv_import::{sample_csv, CsvImportResult, CsvImportService};
pub use data_exchange::{DataExchangeService, ImportBatch, ImportCounts, ImportReport};
pub use data_management::DataManagementService;
pub use documents::DocumentService;
pub use queries::{LiveQuery, QueryService};
pub use validation::ValidationError;
