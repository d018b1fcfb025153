//! Progress logging utilities.

use std::time::Instant;

use log::info;

use crate::config::PROGRESS_LOG_INTERVAL;

/// Logs throughput every [`PROGRESS_LOG_INTERVAL`] exchanges and at `total`.
pub fn log_progress(start_time: Instant, processed: usize, total: usize) {
    if processed % PROGRESS_LOG_INTERVAL != 0 && processed != total {
        return;
    }
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let rate = if elapsed_secs > 0.0 {
        processed as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Processed {}/{} exchanges in {:.2} seconds (~{:.2} exchanges/sec)",
        processed, total, elapsed_secs, rate
    );
}
