//! Configuration constants.
//!
//! This module defines the defaults and limits used throughout the application,
//! including worker pool sizing, index naming and stored message limits.

use std::time::Duration;

/// Default index prefix; the project name is appended to it.
pub const DEFAULT_INDEX_PREFIX: &str = "wase-burp";

/// Default SQLite database path used by the CLI.
pub const DB_PATH: &str = "./traffic_indexer.db";

/// Environment variable overriding [`DB_PATH`].
pub const DB_PATH_ENV: &str = "TRAFFIC_INDEXER_DB_PATH";

// Worker pool sizing
/// Workers kept alive even when idle.
pub const DEFAULT_MIN_WORKERS: usize = 1;
/// Upper bound on concurrently running indexing tasks.
pub const DEFAULT_MAX_WORKERS: usize = 64;
/// Hard ceiling accepted by config validation.
pub const MAX_WORKERS_LIMIT: usize = 1024;
/// Idle time after which workers above the minimum exit.
pub const DEFAULT_WORKER_KEEPALIVE: Duration = Duration::from_secs(5);

// Index naming
/// Characters that may never appear in an index name.
pub const RESERVED_INDEX_CHARS: &[char] = &[
    ':', '"', '*', '+', '/', '\\', '|', '?', '#', '>', '<', '(', ')',
];

// Error message size limits
/// Maximum stored error message length in characters (2000 chars).
/// Per-item bulk errors longer than this are truncated.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

/// Number of processed exchanges between progress log lines in the CLI.
pub const PROGRESS_LOG_INTERVAL: usize = 100;
