//! Configuration types.
//!
//! This module defines the library configuration struct and the enums shared
//! with the command-line parser.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DB_PATH, DEFAULT_INDEX_PREFIX, DEFAULT_MAX_WORKERS, DEFAULT_MIN_WORKERS,
    DEFAULT_WORKER_KEEPALIVE, MAX_WORKERS_LIMIT,
};
use crate::controller::IndexSettings;
use crate::error_handling::ConfigError;
use crate::exchange::ToolFlags;
use crate::executor::ExecutorConfig;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration.
///
/// Holds already-resolved values; nothing in the library reads configuration
/// from disk or the environment on its own.
///
/// # Examples
///
/// ```no_run
/// use traffic_indexer::Config;
///
/// let config = Config {
///     project: "acme-pentest".to_string(),
///     responses_only: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database holding the document indices
    pub db_path: PathBuf,

    /// Index prefix; combined with the project name into the target index
    pub index_prefix: String,

    /// Project name appended to the prefix
    pub project: String,

    /// Tools whose traffic is indexed on the live path
    pub tools: ToolFlags,

    /// Drop request-only exchanges (responses carry their request anyway)
    pub responses_only: bool,

    /// Workers kept alive while idle
    pub min_workers: usize,

    /// Maximum concurrently running indexing tasks
    pub max_workers: usize,

    /// Idle seconds before a worker above the minimum exits
    pub worker_keepalive_secs: u64,

    /// IANA timezone for response-derived timestamps (system local if unset)
    pub timezone: Option<String>,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DB_PATH),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            project: String::new(),
            tools: ToolFlags::PROXY,
            responses_only: true,
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            worker_keepalive_secs: DEFAULT_WORKER_KEEPALIVE.as_secs(),
            timezone: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Checks value ranges that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "min_workers must be at least 1".to_string(),
            ));
        }
        if self.max_workers < self.min_workers {
            return Err(ConfigError::InvalidValue(format!(
                "max_workers ({}) must not be below min_workers ({})",
                self.max_workers, self.min_workers
            )));
        }
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(ConfigError::InvalidValue(format!(
                "max_workers ({}) exceeds the limit of {}",
                self.max_workers, MAX_WORKERS_LIMIT
            )));
        }
        if self.index_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "index prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Policy and index values handed to the controller.
    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            prefix: self.index_prefix.clone(),
            project: self.project.clone(),
            tools: self.tools,
            responses_only: self.responses_only,
        }
    }

    /// Worker pool sizing.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            keepalive: Duration::from_secs(self.worker_keepalive_secs),
        }
    }
}
