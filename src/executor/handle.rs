//! Result handles for submitted work.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error_handling::TaskFailure;

pub(crate) type TaskOutcome<T> = Result<T, TaskFailure>;

/// Future-like handle to a unit of work running on a [`TaskExecutor`].
///
/// Resolves exactly once to the work's value or to the [`TaskFailure`]
/// captured from it. Dropping the handle does not cancel the work.
///
/// [`TaskExecutor`]: super::TaskExecutor
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<TaskOutcome<T>>,
    runtime: Handle,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<TaskOutcome<T>>, runtime: Handle) -> Self {
        Self { rx, runtime }
    }

    /// Waits for the outcome.
    pub async fn wait(self) -> TaskOutcome<T> {
        self.await
    }

    /// Blocks the calling thread until the outcome is available.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async context.
    pub fn blocking_wait(self) -> TaskOutcome<T> {
        self.rx.blocking_recv().unwrap_or(Err(TaskFailure::Dropped))
    }

    /// Takes the outcome if the work has already finished.
    ///
    /// Returns `None` while the work is pending. After the outcome has been
    /// taken, further calls report [`TaskFailure::Dropped`].
    pub fn try_result(&mut self) -> Option<TaskOutcome<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskFailure::Dropped)),
        }
    }

    /// Runs `callback` with the outcome once it is available.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(TaskOutcome<T>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move { callback(self.await) });
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskOutcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskFailure::Dropped)))
    }
}
