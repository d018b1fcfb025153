//! Application initialization and resource setup.
//!
//! This module provides functions to initialize all shared resources:
//! - Logger
//! - Document store (SQLite or in-memory)
//! - Timezone, normalizer and worker pool
//! - The indexing controller wiring them together
//!
//! All initialization functions return proper error types for error handling.

mod logger;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::controller::IndexingController;
use crate::error_handling::ProcessingStats;
use crate::executor::TaskExecutor;
use crate::normalize::{init_timezone, Normalizer};
use crate::storage::{DocumentStore, InMemoryStore, SqliteStore};

// Re-export public API
pub use logger::init_logger_with;

/// Opens the document store: the SQLite database at `config.db_path`, or an
/// in-memory store for dry runs.
pub async fn init_store(config: &Config, dry_run: bool) -> Result<Arc<dyn DocumentStore>> {
    if dry_run {
        info!("Dry run: documents are kept in memory only");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let store = SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

/// Builds a controller from `config` on the current tokio runtime.
///
/// Resolves the timezone once, starts the worker pool and opens the
/// configured index.
pub async fn init_controller(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    stats: Arc<ProcessingStats>,
) -> Result<IndexingController> {
    config.validate().context("Invalid configuration")?;

    let zone = init_timezone(config.timezone.as_deref());
    let normalizer = Arc::new(Normalizer::with_http_analyzer(zone, Arc::clone(&stats)));
    let executor = Arc::new(TaskExecutor::new(config.executor_config(), Handle::current()));

    IndexingController::new(store, executor, normalizer, stats, &config.index_settings())
        .await
        .context("Failed to open the target index")
}
