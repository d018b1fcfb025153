//! Error type definitions.
//!
//! This module defines all error, warning, and info types used throughout the application.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error types for configuration validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of range or otherwise unusable.
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    /// A tool name in the tool selection is not known.
    #[error("Unknown tool name: {0}")]
    UnknownTool(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

/// Failures reported by a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The target index was never created.
    #[error("index_not_found: no such index [{0}]")]
    IndexNotFound(String),

    /// The target index exists but is closed for writes.
    #[error("index_closed: index [{0}] is closed")]
    IndexClosed(String),

    /// The index name is empty after sanitization.
    #[error("invalid_index_name: [{0}] must not be empty")]
    InvalidIndexName(String),

    /// The document mapping lacks required structure.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A bulk request was aborted on its first failing item.
    #[error("bulk request aborted at item {position}: {reason}")]
    BulkAborted {
        /// Zero-based position of the failing item.
        position: usize,
        /// Store-provided failure reason.
        reason: String,
    },

    /// The backing database failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The document could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::SqlError(e))
    }
}

/// Which part of an exchange failed structural parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A request header line.
    RequestHeader,
    /// A response header line.
    ResponseHeader,
}

impl FieldKind {
    /// Returns a human-readable string representation of the field kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::RequestHeader => "request header",
            FieldKind::ResponseHeader => "response header",
        }
    }
}

/// A single header failed structural parsing.
///
/// Never fatal: the caller keeps the raw line and carries on with the rest
/// of the exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {}: {raw:?}", .kind.as_str())]
pub struct MalformedField {
    /// The section the line belongs to.
    pub kind: FieldKind,
    /// The line exactly as received.
    pub raw: String,
}

/// Why a background task did not produce a value.
#[derive(Error, Debug)]
pub enum TaskFailure {
    /// The unit of work returned an error.
    #[error("task failed: {0:#}")]
    Failed(#[from] anyhow::Error),

    /// The unit of work panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The executor shut down before the task produced a result.
    #[error("task was dropped before completion")]
    Dropped,
}

/// Types of errors that can occur while indexing traffic.
///
/// This enum categorizes actual error conditions - failures that lose a
/// document or a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    /// A background indexing task failed or panicked.
    TaskFailure,
    /// The store rejected a single-document write.
    StoreRejected,
    /// The store rejected an item of a bulk request.
    BulkItemRejected,
}

/// Types of warnings that can occur during normalization.
///
/// Warnings indicate degraded fields that don't prevent the document from
/// being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    /// A header line was kept verbatim instead of as name/value.
    MalformedHeader,
    /// A cookie expiration could not be converted and was omitted.
    CookieExpirationDropped,
    /// A response-derived timestamp fell back to the last known value or now.
    TimestampFallback,
}

/// Types of informational metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// A live exchange was dropped by the filter policy.
    ExchangeFiltered,
    /// A bulk exchange was skipped for lacking a response.
    ExchangeSkipped,
    /// A document was acknowledged by the store.
    DocumentIndexed,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::TaskFailure => "Indexing task failure",
            ErrorType::StoreRejected => "Document rejected by store",
            ErrorType::BulkItemRejected => "Bulk item rejected by store",
        }
    }
}

impl WarningType {
    /// Returns a human-readable string representation of the warning type.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::MalformedHeader => "Malformed header kept verbatim",
            WarningType::CookieExpirationDropped => "Cookie expiration omitted",
            WarningType::TimestampFallback => "Timestamp fallback",
        }
    }
}

impl InfoType {
    /// Returns a human-readable string representation of the info type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::ExchangeFiltered => "Exchange filtered by policy",
            InfoType::ExchangeSkipped => "Exchange skipped (no response)",
            InfoType::DocumentIndexed => "Document indexed",
        }
    }
}
