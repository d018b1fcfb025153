// Shared test helpers for store setup and exchange construction.
//
// This module provides common utilities used across multiple test files to reduce duplication.

#![allow(dead_code)] // Each test binary uses a different subset

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::runtime::Handle;

use traffic_indexer::controller::{IndexSettings, IndexingController};
use traffic_indexer::exchange::{Exchange, HttpService, ToolFlags};
use traffic_indexer::executor::{ExecutorConfig, TaskExecutor};
use traffic_indexer::normalize::{Normalizer, ZoneSetting};
use traffic_indexer::storage::{
    run_migrations, BulkItemError, BulkOptions, BulkResponse, DocumentStore, InMemoryStore,
    IndexName, SqliteStore,
};
use traffic_indexer::{ProcessingStats, StoreError};

/// Creates a test database pool with migrations applied.
/// Uses an in-memory database for fast test execution; a single connection
/// so every query sees the same database.
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub async fn create_test_store() -> SqliteStore {
    SqliteStore::new(Arc::new(create_test_pool().await))
}

pub fn service() -> HttpService {
    HttpService::new("https", "shop.example.com", 443)
}

pub fn get_request(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: shop.example.com\r\nAccept: */*\r\n\r\n")
}

pub fn ok_response(date: Option<&str>, body: &str) -> String {
    let date_line = date.map(|d| format!("Date: {d}\r\n")).unwrap_or_default();
    format!(
        "HTTP/1.1 200 OK\r\n{date_line}Content-Type: text/html\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

/// Request plus a 200 response for `path`.
pub fn full_exchange(path: &str) -> Exchange {
    Exchange::new(service())
        .with_request(get_request(path))
        .with_response(ok_response(None, "<html>ok</html>"))
}

pub fn request_only_exchange(path: &str) -> Exchange {
    Exchange::new(service()).with_request(get_request(path))
}

pub fn settings(tools: ToolFlags, responses_only: bool) -> IndexSettings {
    IndexSettings {
        project: "tests".to_string(),
        tools,
        responses_only,
        ..Default::default()
    }
}

/// Controller over `store` with a small pool and UTC timestamps.
pub async fn controller_with(
    store: Arc<dyn DocumentStore>,
    settings: &IndexSettings,
) -> (IndexingController, Arc<ProcessingStats>) {
    let stats = Arc::new(ProcessingStats::new());
    let normalizer = Arc::new(Normalizer::with_http_analyzer(
        ZoneSetting::Unzoned,
        Arc::clone(&stats),
    ));
    let executor = Arc::new(TaskExecutor::new(
        ExecutorConfig {
            min_workers: 1,
            max_workers: 4,
            keepalive: Duration::from_secs(5),
        },
        Handle::current(),
    ));
    let controller =
        IndexingController::new(store, executor, normalizer, Arc::clone(&stats), settings)
            .await
            .expect("Failed to create controller");
    (controller, stats)
}

/// Store that rejects documents whose request URL contains a marker and
/// counts every call it receives.
pub struct RejectingStore {
    inner: InMemoryStore,
    marker: String,
    pub single_writes: AtomicUsize,
    pub bulk_items_seen: AtomicUsize,
}

impl RejectingStore {
    pub fn new(marker: &str) -> Self {
        Self {
            inner: InMemoryStore::new(),
            marker: marker.to_string(),
            single_writes: AtomicUsize::new(0),
            bulk_items_seen: AtomicUsize::new(0),
        }
    }

    pub fn stored(&self, index: &IndexName) -> Vec<Value> {
        self.inner.documents(index)
    }

    fn rejects(&self, source: &Value) -> bool {
        source
            .pointer("/request/url")
            .and_then(Value::as_str)
            .is_some_and(|url| url.contains(&self.marker))
    }
}

#[async_trait]
impl DocumentStore for RejectingStore {
    async fn create_or_open_index(&self, index: &IndexName) -> Result<(), StoreError> {
        self.inner.create_or_open_index(index).await
    }

    async fn index_document(
        &self,
        index: &IndexName,
        source: &Value,
    ) -> Result<String, StoreError> {
        self.single_writes.fetch_add(1, Ordering::SeqCst);
        if self.rejects(source) {
            return Err(StoreError::InvalidDocument("rejected by test store".into()));
        }
        self.inner.index_document(index, source).await
    }

    async fn bulk_index(
        &self,
        items: Vec<Value>,
        options: BulkOptions,
    ) -> Result<BulkResponse, StoreError> {
        self.bulk_items_seen.fetch_add(items.len(), Ordering::SeqCst);
        let mut response = BulkResponse::default();
        let mut accepted = Vec::new();
        for (position, item) in items.into_iter().enumerate() {
            let source = item.get("_source").cloned().unwrap_or(Value::Null);
            if self.rejects(&source) {
                response.failed += 1;
                response.errors.push(BulkItemError {
                    position,
                    index: item
                        .get("_index")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    reason: "mapper_parsing_exception: rejected by test store".into(),
                });
            } else {
                accepted.push(item);
            }
        }
        let inner = self.inner.bulk_index(accepted, options).await?;
        response.success = inner.success;
        response.failed += inner.failed;
        Ok(response)
    }
}
