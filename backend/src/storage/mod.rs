//! # Storage Module
//!
//! Handles persistence for the document store.
//!
//! This module abstracts away the specific storage implementation and
//! provides a consistent interface for persisting and retrieving documents.
//! The implementation can be swapped out (embedded key-value store,
//! in-memory map, ...) without affecting the domain layer.
//!
//! ## Key Responsibilities
//!
//! - **Document persistence**: keyed JSON documents, written whole
//! - **Secondary indexing**: type-tagged sortable keys served via `query`
//! - **Change notification**: a broadcast channel that fires after every
//!   committed write, driving the live-query layer
//!
//! ## Current Implementations
//!
//! - [`SledEngine`]: durable local storage on a sled tree
//! - [`MemoryEngine`]: ephemeral storage for tests and previews

pub mod indexes;
pub mod memory;
pub mod sled_store;
pub mod traits;

pub use indexes::{IndexKey, IndexName, KeyComponent, QueryOptions, QueryRow};
pub use memory::MemoryEngine;
pub use sled_store::SledEngine;
pub use traits::{ChangeEvent, DocRow, DocumentEngine, PutResult};
