//! In-memory document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::{ensure_object, split_bulk_item, BulkOptions, BulkResponse, DocumentStore, IndexName};
use crate::error_handling::StoreError;

#[derive(Debug, Default)]
struct MemoryIndex {
    closed: bool,
    documents: Vec<(String, Value)>,
}

/// A [`DocumentStore`] that keeps everything in process memory.
///
/// Ids are sequential across all indices, starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    indices: RwLock<HashMap<String, MemoryIndex>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents stored in `index` (0 if it does not exist).
    pub fn document_count(&self, index: &IndexName) -> usize {
        self.read()
            .get(index.as_str())
            .map_or(0, |i| i.documents.len())
    }

    /// Sources stored in `index`, in insertion order.
    pub fn documents(&self, index: &IndexName) -> Vec<Value> {
        self.read()
            .get(index.as_str())
            .map(|i| i.documents.iter().map(|(_, v)| v.clone()).collect())
            .unwrap_or_default()
    }

    pub fn close_index(&self, index: &IndexName) -> Result<(), StoreError> {
        let mut indices = self.write();
        let entry = indices
            .get_mut(index.as_str())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        entry.closed = true;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MemoryIndex>> {
        self.indices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, MemoryIndex>> {
        self.indices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(
        &self,
        indices: &mut HashMap<String, MemoryIndex>,
        index: &str,
        source: &Value,
    ) -> Result<String, StoreError> {
        let entry = indices
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;
        if entry.closed {
            return Err(StoreError::IndexClosed(index.to_string()));
        }
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        entry.documents.push((id.clone(), source.clone()));
        Ok(id)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_or_open_index(&self, index: &IndexName) -> Result<(), StoreError> {
        if index.is_empty() {
            return Err(StoreError::InvalidIndexName(index.to_string()));
        }
        self.write().entry(index.to_string()).or_default().closed = false;
        Ok(())
    }

    async fn index_document(
        &self,
        index: &IndexName,
        source: &Value,
    ) -> Result<String, StoreError> {
        ensure_object(source)?;
        let mut indices = self.write();
        self.insert(&mut indices, index.as_str(), source)
    }

    async fn bulk_index(
        &self,
        items: Vec<Value>,
        options: BulkOptions,
    ) -> Result<BulkResponse, StoreError> {
        let mut indices = self.write();
        // Staged so an aborted request leaves nothing behind.
        let mut staged: Vec<(String, Value)> = Vec::new();
        let mut response = BulkResponse::default();

        for (position, item) in items.iter().enumerate() {
            let checked = split_bulk_item(item).and_then(|(index, source)| {
                match indices.get(index) {
                    None => Err(StoreError::IndexNotFound(index.to_string())),
                    Some(i) if i.closed => Err(StoreError::IndexClosed(index.to_string())),
                    Some(_) => Ok((index.to_string(), source.clone())),
                }
            });
            match checked {
                Ok(entry) => {
                    staged.push(entry);
                    response.success += 1;
                }
                Err(e) if options.abort_on_first_error => {
                    return Err(StoreError::BulkAborted {
                        position,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    let index = item.get("_index").and_then(Value::as_str);
                    response.record_failure(position, index, &e.to_string());
                }
            }
        }

        for (index, source) in staged {
            self.insert(&mut indices, &index, &source)?;
        }
        Ok(response)
    }
}
