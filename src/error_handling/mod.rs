//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions for initialization, configuration, storage and tasks
//! - The non-fatal `MalformedField` error used by header parsing
//! - Processing statistics tracking (errors, warnings, info metrics)
//!
//! Error types are categorized into:
//! - **Errors**: Failures that lose a document or a unit of work
//! - **Warnings**: Degraded fields that still produce a document
//! - **Info**: Informational metrics (filtered exchanges, indexed documents)

mod stats;
mod types;

// Re-export public API
pub use stats::ProcessingStats;
pub use types::{
    ConfigError, DatabaseError, ErrorType, FieldKind, InfoType, InitializationError,
    MalformedField, StoreError, TaskFailure, WarningType,
};
