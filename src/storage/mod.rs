//! Document stores.
//!
//! The indexing core only needs the narrow [`DocumentStore`] contract:
//! create or open an index, index one document, bulk-index a batch with
//! per-item accounting. Two implementations ship with the crate:
//!
//! - [`SqliteStore`]: durable, one SQLite database holding any number of
//!   indices (WAL mode, schema migrations from `migrations/`)
//! - [`InMemoryStore`]: same semantics without persistence, used by tests
//!   and dry runs

mod index;
mod memory;
pub mod migrations;
pub mod pool;
mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::error_handling::StoreError;

pub use index::{sanitize_index_name, IndexName};
pub use memory::InMemoryStore;
pub use migrations::run_migrations;
pub use pool::init_db_pool_with_path;
pub use sqlite::SqliteStore;

/// Options for [`DocumentStore::bulk_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOptions {
    /// Stop at the first failing item and write nothing.
    pub abort_on_first_error: bool,
}

/// A bulk item the store rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    /// Zero-based position in the submitted batch.
    pub position: usize,
    /// Target index, when the item named one.
    pub index: Option<String>,
    pub reason: String,
}

/// Outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<BulkItemError>,
}

impl BulkResponse {
    pub(crate) fn record_failure(&mut self, position: usize, index: Option<&str>, reason: &str) {
        self.failed += 1;
        self.errors.push(BulkItemError {
            position,
            index: index.map(str::to_string),
            reason: crate::utils::sanitize::sanitize_and_truncate_error_message(reason),
        });
    }
}

/// Client contract for a document store.
///
/// Bulk items are mappings of the form `{"_index": name, "_source": {...}}`
/// as produced by `Document::to_bulk_value(true)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates `index` if missing; reopens it if it was closed.
    async fn create_or_open_index(&self, index: &IndexName) -> Result<(), StoreError>;

    /// Stores one document source and returns the assigned id.
    async fn index_document(&self, index: &IndexName, source: &Value)
        -> Result<String, StoreError>;

    /// Stores a batch, accounting for every item.
    ///
    /// Item failures are reported in the response unless
    /// `abort_on_first_error` is set, in which case the first one fails the
    /// whole request with [`StoreError::BulkAborted`].
    async fn bulk_index(
        &self,
        items: Vec<Value>,
        options: BulkOptions,
    ) -> Result<BulkResponse, StoreError>;
}

/// Splits a bulk item into its target index and source object.
pub(crate) fn split_bulk_item(item: &Value) -> Result<(&str, &Value), StoreError> {
    let index = item
        .get("_index")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidDocument("bulk item has no _index".to_string()))?;
    let source = item
        .get("_source")
        .filter(|s| s.is_object())
        .ok_or_else(|| StoreError::InvalidDocument("bulk item has no _source object".to_string()))?;
    Ok((index, source))
}

pub(crate) fn ensure_object(source: &Value) -> Result<(), StoreError> {
    if source.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidDocument(
            "document source must be a JSON object".to_string(),
        ))
    }
}
