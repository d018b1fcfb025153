//! Command-line interface definitions.
//!
//! # Examples
//!
//! ```bash
//! # Bulk-import a capture file into the default index
//! traffic_indexer import capture.jsonl --project "acme pentest"
//!
//! # Replay a capture through the live path, indexing proxy and repeater traffic
//! traffic_indexer replay capture.jsonl --tools proxy,repeater --max-workers 16
//!
//! # Show the index a prefix/project pair maps to
//! traffic_indexer index-name --project "Client X (2024)"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::constants::{DEFAULT_INDEX_PREFIX, DEFAULT_MAX_WORKERS, DEFAULT_MIN_WORKERS};
use crate::config::types::{Config, LogFormat, LogLevel};
use crate::exchange::ToolFlags;
use crate::storage::pool::db_path_from_env;

#[derive(Debug, Parser)]
#[command(
    name = "traffic_indexer",
    about = "Normalizes captured HTTP traffic into searchable documents."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bulk-import every exchange of a capture file
    Import(CaptureArgs),

    /// Push every exchange of a capture file through the live path
    Replay(CaptureArgs),

    /// Print the sanitized index name for a prefix and project
    IndexName {
        /// Index prefix
        #[arg(long, default_value = DEFAULT_INDEX_PREFIX)]
        index_prefix: String,

        /// Project name
        #[arg(long, default_value = "")]
        project: String,
    },
}

/// Arguments shared by the capture-driven subcommands.
#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Capture file (JSON Lines)
    #[arg(value_parser)]
    pub capture: PathBuf,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Database path (SQLite file); defaults to $TRAFFIC_INDEXER_DB_PATH, then ./traffic_indexer.db
    #[arg(long, value_parser)]
    pub db_path: Option<PathBuf>,

    /// Keep documents in memory instead of writing the database
    #[arg(long)]
    pub dry_run: bool,

    /// Index prefix
    #[arg(long, default_value = DEFAULT_INDEX_PREFIX)]
    pub index_prefix: String,

    /// Project name appended to the index prefix
    #[arg(long, default_value = "")]
    pub project: String,

    /// Tools to index: comma-separated names (proxy,repeater,...) or a numeric mask
    #[arg(long, default_value = "proxy")]
    pub tools: ToolFlags,

    /// Also index exchanges without a response
    #[arg(long)]
    pub include_requests: bool,

    /// Workers kept alive while idle
    #[arg(long, default_value_t = DEFAULT_MIN_WORKERS)]
    pub min_workers: usize,

    /// Maximum concurrently running indexing tasks
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Idle seconds before a worker above the minimum exits
    #[arg(long, default_value_t = 5)]
    pub worker_keepalive_secs: u64,

    /// IANA timezone for timestamps derived from Date headers (default: system zone)
    #[arg(long)]
    pub timezone: Option<String>,
}

impl CaptureArgs {
    pub fn to_config(&self) -> Config {
        Config {
            db_path: self.db_path.clone().unwrap_or_else(db_path_from_env),
            index_prefix: self.index_prefix.clone(),
            project: self.project.clone(),
            tools: self.tools,
            responses_only: !self.include_requests,
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            worker_keepalive_secs: self.worker_keepalive_secs,
            timezone: self.timezone.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }
}
