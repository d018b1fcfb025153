//! SQLite-backed document store.
//!
//! Every index is a row in `doc_indices`; documents carry their index name,
//! the JSON source and a few denormalized columns (timestamp, host, method,
//! URL, status) so captured traffic can be queried with plain SQL.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{
    ensure_object, init_db_pool_with_path, run_migrations, split_bulk_item, BulkOptions,
    BulkResponse, DocumentStore, IndexName,
};
use crate::error_handling::{DatabaseError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexState {
    Open,
    Closed,
    Missing,
}

/// Columns copied out of a document source.
struct Summary<'a> {
    timestamp: Option<&'a str>,
    protocol: Option<&'a str>,
    host: Option<&'a str>,
    port: Option<i64>,
    method: Option<&'a str>,
    url: Option<&'a str>,
    status: Option<i64>,
}

impl<'a> Summary<'a> {
    fn of(source: &'a Value) -> Self {
        let request = source.get("request");
        let response = source.get("response");
        Self {
            timestamp: source.get("timestamp").and_then(Value::as_str),
            protocol: source.get("protocol").and_then(Value::as_str),
            host: source.get("host").and_then(Value::as_str),
            port: source.get("port").and_then(Value::as_i64),
            method: request.and_then(|r| r.get("method")).and_then(Value::as_str),
            url: request.and_then(|r| r.get("url")).and_then(Value::as_str),
            status: response.and_then(|r| r.get("status")).and_then(Value::as_i64),
        }
    }
}

/// Document store over a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    /// Wraps a pool whose schema is already migrated.
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `path` and migrates it.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = init_db_pool_with_path(path).await?;
        run_migrations(&pool).await?;
        info!("Document store ready at {}", path.display());
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of documents stored in `index`.
    pub async fn count_documents(&self, index: &IndexName) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents WHERE index_name = ?")
            .bind(index.as_str())
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Closes `index`; writes to it fail until it is opened again.
    pub async fn close_index(&self, index: &IndexName) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE doc_indices SET closed = 1 WHERE name = ?")
            .bind(index.as_str())
            .execute(self.pool.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }
        debug!("Closed index {}", index);
        Ok(())
    }

    /// Fetches a stored source by id.
    pub async fn get_document(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let Ok(id) = id.parse::<i64>() else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT source FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => {
                let source: String = row.get("source");
                Ok(Some(serde_json::from_str(&source)?))
            }
            None => Ok(None),
        }
    }

    async fn index_state<'e, E>(executor: E, name: &str) -> Result<IndexState, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT closed FROM doc_indices WHERE name = ?")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        Ok(match row {
            None => IndexState::Missing,
            Some(row) if row.get::<i64, _>("closed") != 0 => IndexState::Closed,
            Some(_) => IndexState::Open,
        })
    }

    async fn insert<'e, E>(executor: E, index: &str, source: &Value) -> Result<i64, StoreError>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let summary = Summary::of(source);
        let encoded = serde_json::to_string(source)?;
        let result = sqlx::query(
            "INSERT INTO documents
                 (index_name, timestamp, protocol, host, port, method, url, status, source, indexed_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(index)
        .bind(summary.timestamp)
        .bind(summary.protocol)
        .bind(summary.host)
        .bind(summary.port)
        .bind(summary.method)
        .bind(summary.url)
        .bind(summary.status)
        .bind(encoded)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(executor)
        .await
        .map_err(DatabaseError::SqlError)?;
        Ok(result.last_insert_rowid())
    }

    /// Writes one bulk item inside `tx`, caching index lookups in `states`.
    async fn bulk_item(
        tx: &mut Transaction<'_, Sqlite>,
        states: &mut HashMap<String, IndexState>,
        item: &Value,
    ) -> Result<(), StoreError> {
        let (index, source) = split_bulk_item(item)?;
        let state = match states.get(index) {
            Some(state) => *state,
            None => {
                let state = Self::index_state(&mut **tx, index).await?;
                states.insert(index.to_string(), state);
                state
            }
        };
        match state {
            IndexState::Missing => Err(StoreError::IndexNotFound(index.to_string())),
            IndexState::Closed => Err(StoreError::IndexClosed(index.to_string())),
            IndexState::Open => Self::insert(&mut **tx, index, source).await.map(|_| ()),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_or_open_index(&self, index: &IndexName) -> Result<(), StoreError> {
        if index.is_empty() {
            return Err(StoreError::InvalidIndexName(index.to_string()));
        }
        sqlx::query(
            "INSERT INTO doc_indices (name, created_at_ms, closed) VALUES (?, ?, 0)
             ON CONFLICT(name) DO UPDATE SET closed = 0",
        )
        .bind(index.as_str())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(self.pool.as_ref())
        .await?;
        debug!("Index {} is open", index);
        Ok(())
    }

    async fn index_document(
        &self,
        index: &IndexName,
        source: &Value,
    ) -> Result<String, StoreError> {
        ensure_object(source)?;
        match Self::index_state(self.pool.as_ref(), index.as_str()).await? {
            IndexState::Missing => return Err(StoreError::IndexNotFound(index.to_string())),
            IndexState::Closed => return Err(StoreError::IndexClosed(index.to_string())),
            IndexState::Open => {}
        }
        let id = Self::insert(self.pool.as_ref(), index.as_str(), source).await?;
        Ok(id.to_string())
    }

    async fn bulk_index(
        &self,
        items: Vec<Value>,
        options: BulkOptions,
    ) -> Result<BulkResponse, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut states = HashMap::new();
        let mut response = BulkResponse::default();

        for (position, item) in items.iter().enumerate() {
            match Self::bulk_item(&mut tx, &mut states, item).await {
                Ok(()) => response.success += 1,
                Err(e) => {
                    if options.abort_on_first_error {
                        tx.rollback().await?;
                        return Err(StoreError::BulkAborted {
                            position,
                            reason: e.to_string(),
                        });
                    }
                    let index = item.get("_index").and_then(Value::as_str);
                    warn!("Bulk item {} rejected: {}", position, e);
                    response.record_failure(position, index, &e.to_string());
                }
            }
        }

        tx.commit().await?;
        debug!(
            "Bulk request: {} stored, {} failed",
            response.success, response.failed
        );
        Ok(response)
    }
}
