//! Process-wide observer for task failures nobody else will see.

use std::sync::{Arc, LazyLock, RwLock};

use crate::error_handling::TaskFailure;

/// Callback invoked with failures that have no handle left to carry them.
pub type FailureHandler = Arc<dyn Fn(&TaskFailure) + Send + Sync>;

static DEFAULT_HANDLER: LazyLock<RwLock<Option<FailureHandler>>> =
    LazyLock::new(|| RwLock::new(None));

/// Installs (or with `None`, removes) the default failure handler.
///
/// The handler sees failures raised outside any handle: work that failed
/// after its handle was dropped, and work that could not be dispatched
/// because the executor had shut down. Returns the previous handler.
pub fn set_default_failure_handler(handler: Option<FailureHandler>) -> Option<FailureHandler> {
    let mut slot = DEFAULT_HANDLER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *slot, handler)
}

pub(crate) fn report_unobserved(failure: &TaskFailure) {
    let handler = DEFAULT_HANDLER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    match handler {
        Some(handler) => handler(failure),
        None => log::debug!("Unobserved task failure: {}", failure),
    }
}
