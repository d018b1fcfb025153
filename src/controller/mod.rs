//! Per-exchange and bulk indexing flows.
//!
//! [`IndexingController::on_exchange`] is the live path: it filters, then
//! hands normalization and a single-document write to the executor and
//! returns at once. [`IndexingController::bulk_import`] is the batch path:
//! it normalizes every selected exchange in order, dating each from its
//! response's `Date` header, and submits one bulk request.
//!
//! Policy and target index live in an immutable snapshot swapped by
//! [`IndexingController::apply_config`]; readers always see the last
//! applied snapshot.

mod policy;

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::Context;
use log::{debug, info, trace, warn};

use crate::error_handling::{ErrorType, InfoType, ProcessingStats, StoreError};
use crate::exchange::{Exchange, ToolFlags};
use crate::executor::{TaskExecutor, TaskHandle};
use crate::normalize::{Normalizer, TimestampCarry, TimestampMode};
use crate::storage::{BulkItemError, BulkOptions, DocumentStore, IndexName};

pub use policy::{FilterPolicy, IndexSettings};

#[derive(Debug)]
struct ActiveSettings {
    policy: FilterPolicy,
    index: IndexName,
}

/// Outcome of [`IndexingController::bulk_import`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkImportReport {
    /// Exchanges submitted to the store.
    pub attempted: usize,
    pub success: usize,
    pub failed: usize,
    /// Exchanges not submitted (no response under responses-only, or empty).
    pub skipped: usize,
    /// Rejected items; `position` is the exchange's position in the input.
    pub errors: Vec<BulkItemError>,
}

impl BulkImportReport {
    /// One-line summary for the user.
    pub fn summary(&self) -> String {
        format!(
            "Successfully imported {} messages, {} messages failed",
            self.success, self.failed
        )
    }
}

/// Orchestrates filtering, normalization and writes.
pub struct IndexingController {
    store: Arc<dyn DocumentStore>,
    executor: Arc<TaskExecutor>,
    normalizer: Arc<Normalizer>,
    active: RwLock<Arc<ActiveSettings>>,
    carry: Mutex<TimestampCarry>,
    stats: Arc<ProcessingStats>,
}

impl IndexingController {
    /// Creates a controller and applies `settings` (opening the index).
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        executor: Arc<TaskExecutor>,
        normalizer: Arc<Normalizer>,
        stats: Arc<ProcessingStats>,
        settings: &IndexSettings,
    ) -> Result<Self, StoreError> {
        let controller = Self {
            store,
            executor,
            normalizer,
            active: RwLock::new(Arc::new(ActiveSettings {
                policy: settings.policy(),
                index: settings.index_name(),
            })),
            carry: Mutex::new(None),
            stats,
        };
        controller.apply_config(settings).await?;
        Ok(controller)
    }

    /// Opens the settings' index, then makes the settings current.
    ///
    /// On failure the previous settings stay in effect.
    pub async fn apply_config(&self, settings: &IndexSettings) -> Result<IndexName, StoreError> {
        let index = settings.index_name();
        self.store.create_or_open_index(&index).await?;

        let next = Arc::new(ActiveSettings {
            policy: settings.policy(),
            index: index.clone(),
        });
        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;

        info!(
            "Indexing into {} (tools: {}, responses only: {})",
            index, settings.tools, settings.responses_only
        );
        Ok(index)
    }

    fn snapshot(&self) -> Arc<ActiveSettings> {
        Arc::clone(
            &self
                .active
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn lock_carry(&self) -> MutexGuard<'_, TimestampCarry> {
        self.carry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn index(&self) -> IndexName {
        self.snapshot().index.clone()
    }

    pub fn policy(&self) -> FilterPolicy {
        self.snapshot().policy
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    /// Last timestamp derived from a response `Date` header.
    pub fn last_timestamp(&self) -> TimestampCarry {
        *self.lock_carry()
    }

    /// Live path. Returns without blocking.
    ///
    /// Returns `None` when the exchange is dropped by the filter policy (or
    /// has neither request nor response); otherwise the handle of the
    /// submitted task, resolving to the stored document's id. Callers are
    /// free to drop the handle.
    pub fn on_exchange(
        &self,
        tool: ToolFlags,
        is_request: bool,
        exchange: Exchange,
    ) -> Option<TaskHandle<String>> {
        let active = self.snapshot();
        if !active.policy.accepts(tool, is_request) {
            trace!(
                "Dropping {} exchange from {} (is_request: {})",
                exchange.service.host,
                tool,
                is_request
            );
            self.stats.increment_info(InfoType::ExchangeFiltered);
            return None;
        }
        if !exchange.has_request() && !exchange.has_response() {
            self.stats.increment_info(InfoType::ExchangeSkipped);
            return None;
        }

        let store = Arc::clone(&self.store);
        let normalizer = Arc::clone(&self.normalizer);
        let stats = Arc::clone(&self.stats);
        let mut carry = self.last_timestamp();
        let index = active.index.clone();

        Some(self.executor.submit(async move {
            let mut doc =
                normalizer.normalize(&index, &exchange, TimestampMode::CaptureTime, &mut carry);
            match doc.persist(store.as_ref()).await {
                Ok(id) => {
                    stats.increment_info(InfoType::DocumentIndexed);
                    debug!("Indexed {} as {}/{}", exchange.service.host, index, id);
                    Ok(id)
                }
                Err(e) => {
                    stats.increment_error(ErrorType::StoreRejected);
                    warn!("Failed to index exchange with {}: {}", exchange.service.host, e);
                    Err(e).with_context(|| format!("indexing exchange with {}", exchange.service.host))
                }
            }
        }))
    }

    /// Batch path.
    ///
    /// `progress` is called after each exchange, skipped ones included, with
    /// the number processed so far. All selected documents go to the store
    /// in one request that reports failures per item instead of aborting.
    /// Must not run concurrently with itself on one controller.
    pub async fn bulk_import<'a, I, P>(
        &self,
        exchanges: I,
        mut progress: P,
    ) -> Result<BulkImportReport, StoreError>
    where
        I: IntoIterator<Item = &'a Exchange>,
        P: FnMut(usize),
    {
        let active = self.snapshot();
        let mut report = BulkImportReport::default();
        let mut batch = Vec::new();
        let mut origins = Vec::new();

        for (position, exchange) in exchanges.into_iter().enumerate() {
            if active.policy.skips_in_bulk(exchange) {
                report.skipped += 1;
            } else {
                let doc = {
                    let mut carry = self.lock_carry();
                    self.normalizer.normalize(
                        &active.index,
                        exchange,
                        TimestampMode::ResponseDate,
                        &mut carry,
                    )
                };
                batch.push(doc.to_bulk_value(true)?);
                origins.push(position);
            }
            progress(position + 1);
        }

        self.stats
            .add_info(InfoType::ExchangeSkipped, report.skipped);
        report.attempted = batch.len();
        if batch.is_empty() {
            info!("Nothing to import ({} skipped)", report.skipped);
            return Ok(report);
        }

        let response = self
            .store
            .bulk_index(
                batch,
                BulkOptions {
                    abort_on_first_error: false,
                },
            )
            .await?;

        report.success = response.success;
        report.failed = response.failed;
        report.errors = response
            .errors
            .into_iter()
            .map(|mut e| {
                e.position = origins.get(e.position).copied().unwrap_or(e.position);
                e
            })
            .collect();

        self.stats
            .add_info(InfoType::DocumentIndexed, report.success);
        self.stats
            .add_error(ErrorType::BulkItemRejected, report.failed);
        info!("{}", report.summary());
        Ok(report)
    }
}
