//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `traffic_indexer` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use traffic_indexer::config::cli::{CaptureArgs, Cli, Command};
use traffic_indexer::executor::set_default_failure_handler;
use traffic_indexer::initialization::init_logger_with;
use traffic_indexer::storage::IndexName;
use traffic_indexer::{run_import, run_replay, TaskFailure};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::IndexName {
            index_prefix,
            project,
        } => {
            println!("{}", IndexName::from_parts(&index_prefix, &project));
            Ok(())
        }
        Command::Import(args) => {
            init_logging(&args)?;
            let config = args.to_config();
            match run_import(&config, &args.capture, args.dry_run).await {
                Ok(report) => {
                    println!("{}", report.bulk.summary());
                    println!(
                        "Index {}: {} skipped, {} unreadable lines, {:.1}s",
                        report.index,
                        report.bulk.skipped,
                        report.malformed_lines,
                        report.elapsed_seconds
                    );
                    Ok(())
                }
                Err(e) => {
                    eprintln!("traffic_indexer error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Command::Replay(args) => {
            init_logging(&args)?;
            set_default_failure_handler(Some(Arc::new(|failure: &TaskFailure| {
                log::warn!("Unobserved indexing failure: {}", failure);
            })));
            let config = args.to_config();
            match run_replay(&config, &args.capture, args.dry_run).await {
                Ok(report) => {
                    println!(
                        "Indexed {} of {} exchanges ({} filtered, {} skipped, {} failed) in {:.1}s",
                        report.indexed,
                        report.total,
                        report.filtered,
                        report.skipped,
                        report.failed,
                        report.elapsed_seconds
                    );
                    Ok(())
                }
                Err(e) => {
                    eprintln!("traffic_indexer error: {:#}", e);
                    process::exit(1);
                }
            }
        }
    }
}

fn init_logging(args: &CaptureArgs) -> Result<()> {
    init_logger_with(args.log_level.clone().into(), args.log_format.clone())
        .context("Failed to initialize logger")
}
