//! traffic_indexer library: captured HTTP traffic to searchable documents
//!
//! This library turns request/response exchanges seen by an intercepting
//! proxy into structured documents (headers, typed parameters, cookies,
//! content-type classification, derived timestamps) and writes them to a
//! document store, either one by one on a bounded worker pool as traffic
//! flows, or as one bulk request with per-item accounting.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use traffic_indexer::exchange::{Exchange, HttpService, ToolFlags};
//! use traffic_indexer::initialization::init_controller;
//! use traffic_indexer::storage::InMemoryStore;
//! use traffic_indexer::{Config, ProcessingStats};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     project: "acme".to_string(),
//!     ..Default::default()
//! };
//! let stats = Arc::new(ProcessingStats::new());
//! let controller = init_controller(&config, Arc::new(InMemoryStore::new()), stats).await?;
//!
//! let exchange = Exchange::new(HttpService::new("https", "example.com", 443))
//!     .with_request("GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
//!     .with_response("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html></html>");
//! if let Some(handle) = controller.on_exchange(ToolFlags::PROXY, false, exchange) {
//!     println!("stored as {}", handle.await?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod app;
pub mod config;
pub mod controller;
pub mod document;
mod error_handling;
pub mod exchange;
pub mod executor;
pub mod initialization;
pub mod normalize;
pub mod storage;
mod utils;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use controller::{BulkImportReport, IndexSettings, IndexingController};
pub use error_handling::{
    ConfigError, DatabaseError, ErrorType, FieldKind, InfoType, InitializationError,
    MalformedField, ProcessingStats, StoreError, TaskFailure, WarningType,
};
pub use run::{run_import, run_replay, ImportReport, ReplayReport};

// Capture-driven runs used by the CLI
mod run {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Instant;

    use anyhow::{Context, Result};
    use log::{info, warn};

    use crate::app::{log_progress, print_error_statistics};
    use crate::config::Config;
    use crate::controller::BulkImportReport;
    use crate::error_handling::{ErrorType, InfoType, ProcessingStats};
    use crate::exchange::capture::load_capture_file;
    use crate::initialization::{init_controller, init_store};
    use crate::storage::IndexName;

    /// Results of a bulk import run.
    #[derive(Debug, Clone)]
    pub struct ImportReport {
        /// Index the documents were written to
        pub index: IndexName,
        /// Store outcome for the imported exchanges
        pub bulk: BulkImportReport,
        /// Capture lines that could not be read
        pub malformed_lines: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Results of a live-path replay run.
    #[derive(Debug, Clone, Default)]
    pub struct ReplayReport {
        /// Exchanges read from the capture
        pub total: usize,
        /// Exchanges dropped by the filter policy
        pub filtered: usize,
        /// Accepted exchanges with neither a request nor a response
        pub skipped: usize,
        /// Documents stored
        pub indexed: usize,
        /// Submitted exchanges whose task failed
        pub failed: usize,
        /// Capture lines that could not be read
        pub malformed_lines: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Bulk-imports every exchange of `capture`.
    ///
    /// The tool selection does not apply: the capture is the selection. With
    /// responses-only set, exchanges without a response are skipped.
    pub async fn run_import(config: &Config, capture: &Path, dry_run: bool) -> Result<ImportReport> {
        let start = Instant::now();
        let load = load_capture_file(capture)
            .await
            .with_context(|| format!("Failed to read capture {}", capture.display()))?;
        info!(
            "Loaded {} exchanges from {}",
            load.exchanges.len(),
            capture.display()
        );

        let stats = Arc::new(ProcessingStats::new());
        let store = init_store(config, dry_run).await?;
        let controller = init_controller(config, store, Arc::clone(&stats)).await?;

        let total = load.exchanges.len();
        let bulk = controller
            .bulk_import(load.exchanges.iter().map(|c| &c.exchange), |done| {
                log_progress(start, done, total)
            })
            .await
            .context("Bulk request failed")?;
        for error in bulk.errors.iter().take(10) {
            warn!("Exchange {} rejected: {}", error.position + 1, error.reason);
        }

        print_error_statistics(&stats);
        controller.executor().shutdown().await;

        Ok(ImportReport {
            index: controller.index(),
            bulk,
            malformed_lines: load.malformed.len(),
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Feeds every exchange of `capture` through the live path and waits for
    /// the submitted tasks.
    ///
    /// Exchanges with a response arrive as response notifications; those
    /// without one arrive as request notifications.
    pub async fn run_replay(config: &Config, capture: &Path, dry_run: bool) -> Result<ReplayReport> {
        let start = Instant::now();
        let load = load_capture_file(capture)
            .await
            .with_context(|| format!("Failed to read capture {}", capture.display()))?;

        let stats = Arc::new(ProcessingStats::new());
        let store = init_store(config, dry_run).await?;
        let controller = init_controller(config, store, Arc::clone(&stats)).await?;

        let mut report = ReplayReport {
            total: load.exchanges.len(),
            malformed_lines: load.malformed.len(),
            ..Default::default()
        };
        let mut handles = Vec::new();
        for captured in load.exchanges {
            let is_request = !captured.exchange.has_response();
            let accepted = controller.on_exchange(captured.tool, is_request, captured.exchange);
            handles.extend(accepted);
        }
        report.filtered = stats.get_info_count(InfoType::ExchangeFiltered);
        report.skipped = stats.get_info_count(InfoType::ExchangeSkipped);
        let submitted = handles.len();
        info!(
            "Submitted {} exchanges ({} filtered, {} skipped, {} queued)",
            submitted,
            report.filtered,
            report.skipped,
            controller.executor().queued()
        );

        for (done, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(_) => report.indexed += 1,
                Err(e) => {
                    stats.increment_error(ErrorType::TaskFailure);
                    warn!("{}", e);
                    report.failed += 1;
                }
            }
            log_progress(start, done + 1, submitted);
        }

        controller.executor().shutdown().await;
        print_error_statistics(&stats);
        report.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok(report)
    }
}
