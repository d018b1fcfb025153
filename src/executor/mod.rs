//! Bounded worker pool with an unbounded queue.
//!
//! [`TaskExecutor::submit`] enqueues and returns at once; it never blocks
//! and never rejects work, so the traffic source is never stalled by
//! indexing capacity. Up to `max_workers` workers drain the queue. Workers
//! above `min_workers` exit after sitting idle for `keepalive`.
//!
//! Errors returned by the work and panics inside it are captured into the
//! work's [`TaskHandle`]; neither reaches the worker. Failures with no
//! handle left to observe them go to the process-wide handler installed
//! with [`set_default_failure_handler`].

mod handle;
mod handler;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use log::{debug, trace};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::config::{DEFAULT_MAX_WORKERS, DEFAULT_MIN_WORKERS, DEFAULT_WORKER_KEEPALIVE};
use crate::error_handling::TaskFailure;

pub use handle::TaskHandle;
pub use handler::{set_default_failure_handler, FailureHandler};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    /// Idle time after which a worker above the minimum exits.
    pub keepalive: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            keepalive: DEFAULT_WORKER_KEEPALIVE,
        }
    }
}

struct Shared {
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>,
    workers: AtomicUsize,
    idle: AtomicUsize,
    queued: AtomicUsize,
    exited: Notify,
    min_workers: usize,
    max_workers: usize,
    keepalive: Duration,
}

impl Shared {
    /// Claims a worker slot if the backlog outnumbers idle workers and the
    /// pool is below maximum.
    fn claim_worker_slot(&self) -> bool {
        if self.queued.load(Ordering::SeqCst) <= self.idle.load(Ordering::SeqCst) {
            return false;
        }
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_workers).then_some(n + 1)
            })
            .is_ok()
    }

    /// Releases an idle worker's slot if the pool is above minimum.
    fn try_retire(&self) -> bool {
        if self.queued.load(Ordering::SeqCst) > 0 {
            return false;
        }
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > self.min_workers).then_some(n - 1)
            })
            .is_ok()
    }
}

/// Runs units of work on a bounded pool of tokio tasks.
pub struct TaskExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    shared: Arc<Shared>,
    runtime: Handle,
}

impl TaskExecutor {
    /// Creates an executor whose workers run on `runtime`.
    ///
    /// No worker is started until work arrives. A minimum of zero is raised
    /// to one so queued work is always drained, and a maximum below the
    /// minimum is raised to it.
    pub fn new(config: ExecutorConfig, runtime: Handle) -> Self {
        let min_workers = config.min_workers.max(1);
        let max_workers = config.max_workers.max(min_workers);
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(
            "Task executor: {}..{} workers, keepalive {:?}",
            min_workers, max_workers, config.keepalive
        );
        Self {
            sender: Mutex::new(Some(tx)),
            shared: Arc::new(Shared {
                receiver: tokio::sync::Mutex::new(rx),
                workers: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                exited: Notify::new(),
                min_workers,
                max_workers,
                keepalive: config.keepalive,
            }),
            runtime,
        }
    }

    /// Queues `work` and returns its handle without waiting.
    ///
    /// Callable from any thread, inside the runtime or not.
    pub fn submit<F, T>(&self, work: F) -> TaskHandle<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(TaskFailure::Failed(e)),
                Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
            };
            if let Err(Err(failure)) = tx.send(outcome) {
                handler::report_unobserved(&failure);
            }
        });

        self.dispatch(job);
        TaskHandle::new(rx, self.runtime.clone())
    }

    fn dispatch(&self, job: Job) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let Some(sender) = sender else {
            // Dropping the job drops its result sender; the handle sees Dropped.
            handler::report_unobserved(&TaskFailure::Dropped);
            return;
        };

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            handler::report_unobserved(&TaskFailure::Dropped);
            return;
        }

        if self.shared.claim_worker_slot() {
            trace!(
                "Starting worker ({} running)",
                self.shared.workers.load(Ordering::SeqCst)
            );
            self.runtime.spawn(worker_loop(Arc::clone(&self.shared)));
        }
    }

    /// Workers currently alive.
    pub fn worker_count(&self) -> usize {
        self.shared.workers.load(Ordering::SeqCst)
    }

    /// Work submitted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Stops accepting work and waits until queued work has finished.
    ///
    /// Work submitted afterwards resolves to [`TaskFailure::Dropped`].
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        loop {
            let exited = self.shared.exited.notified();
            tokio::pin!(exited);
            exited.as_mut().enable();
            if self.shared.workers.load(Ordering::SeqCst) == 0 {
                break;
            }
            exited.await;
        }
        debug!("Task executor shut down");
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    loop {
        shared.idle.fetch_add(1, Ordering::SeqCst);
        let next = tokio::time::timeout(shared.keepalive, async {
            shared.receiver.lock().await.recv().await
        })
        .await;
        shared.idle.fetch_sub(1, Ordering::SeqCst);

        match next {
            Ok(Some(job)) => {
                shared.queued.fetch_sub(1, Ordering::SeqCst);
                job.await;
            }
            Ok(None) => {
                // Queue closed and drained.
                shared.workers.fetch_sub(1, Ordering::SeqCst);
                break;
            }
            Err(_) => {
                if shared.try_retire() {
                    trace!("Idle worker retired");
                    break;
                }
            }
        }
    }
    shared.exited.notify_waiters();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::{Barrier, Semaphore};

    fn executor(min: usize, max: usize, keepalive: Duration) -> TaskExecutor {
        TaskExecutor::new(
            ExecutorConfig {
                min_workers: min,
                max_workers: max,
                keepalive,
            },
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_submit_returns_value() {
        let ex = executor(1, 4, Duration::from_secs(5));
        let handle = ex.submit(async { anyhow::Ok(21 * 2) });
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_error_is_captured() {
        let ex = executor(1, 4, Duration::from_secs(5));
        let result: Result<(), _> = ex.submit(async { Err(anyhow!("store said no")) }).await;
        match result {
            Err(TaskFailure::Failed(e)) => assert_eq!(e.to_string(), "store said no"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panic_is_captured_and_pool_survives() {
        let ex = executor(1, 1, Duration::from_secs(5));
        let bad = ex.submit(async {
            if true {
                panic!("boom");
            }
            anyhow::Ok(())
        });
        let good = ex.submit(async { anyhow::Ok("still running") });

        match bad.await {
            Err(TaskFailure::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(good.await.unwrap(), "still running");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_do_not_block_later_work() {
        let ex = executor(1, 4, Duration::from_secs(5));
        let handles: Vec<_> = (0..20)
            .map(|k| {
                ex.submit(async move {
                    if k % 5 == 0 {
                        Err(anyhow!("unit {k} failed"))
                    } else {
                        Ok(k)
                    }
                })
            })
            .collect();

        for (k, handle) in handles.into_iter().enumerate() {
            let outcome = handle.await;
            if k % 5 == 0 {
                assert!(matches!(outcome, Err(TaskFailure::Failed(_))));
            } else {
                assert_eq!(outcome.unwrap(), k);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_never_blocks_when_saturated() {
        let ex = executor(1, 2, Duration::from_secs(5));
        let gate = Arc::new(Semaphore::new(0));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            handles.push(ex.submit(async move {
                let _permit = gate.acquire().await?;
                anyhow::Ok(())
            }));
        }
        // Both workers are parked on the gate; these only queue up.
        for _ in 0..100 {
            handles.push(ex.submit(async { anyhow::Ok(()) }));
        }
        assert!(ex.worker_count() <= 2);

        gate.add_permits(2);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ex.queued(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_burst_grows_pool_to_maximum() {
        let ex = executor(1, 4, Duration::from_secs(30));
        ex.submit(async { anyhow::Ok(()) }).await.unwrap();
        assert_eq!(ex.worker_count(), 1);

        // Every job waits for all the others, so they only finish if four
        // workers run them at the same time.
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                ex.submit(async move {
                    barrier.wait().await;
                    anyhow::Ok(())
                })
            })
            .collect();

        let all = async {
            for handle in handles {
                handle.await.unwrap();
            }
        };
        tokio::time::timeout(Duration::from_secs(2), all)
            .await
            .expect("burst jobs should run in parallel");
        assert_eq!(ex.worker_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_workers_above_minimum_are_reclaimed() {
        let ex = executor(1, 4, Duration::from_millis(100));
        let gate = Arc::new(Semaphore::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                ex.submit(async move {
                    let _permit = gate.acquire().await?;
                    anyhow::Ok(())
                })
            })
            .collect();
        assert!(ex.worker_count() >= 1);

        gate.add_permits(4);
        for handle in handles {
            handle.await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ex.worker_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_then_drops_new_work() {
        let ex = executor(1, 1, Duration::from_secs(5));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let queued = ex.submit(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            flag.store(true, Ordering::SeqCst);
            anyhow::Ok(())
        });

        ex.shutdown().await;
        assert!(ran.load(Ordering::SeqCst));
        queued.await.unwrap();
        assert_eq!(ex.worker_count(), 0);

        let late = ex.submit(async { anyhow::Ok(()) });
        assert!(matches!(late.await, Err(TaskFailure::Dropped)));
    }

    #[tokio::test]
    async fn test_try_result_and_on_complete() {
        let ex = executor(1, 1, Duration::from_secs(5));
        let gate = Arc::new(Notify::new());
        let g = Arc::clone(&gate);
        let mut handle = ex.submit(async move {
            g.notified().await;
            anyhow::Ok(7)
        });
        assert!(handle.try_result().is_none());

        let (tx, rx) = oneshot::channel();
        ex.submit(async { anyhow::Ok("done") }).on_complete(move |outcome| {
            let _ = tx.send(outcome.ok());
        });

        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.try_result().unwrap().unwrap(), 7);
        assert_eq!(rx.await.unwrap(), Some("done"));
    }

    #[test]
    fn test_blocking_wait_from_plain_thread() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let ex = TaskExecutor::new(ExecutorConfig::default(), rt.handle().clone());
        let handle = ex.submit(async { anyhow::Ok(String::from("from the pool")) });
        let value = std::thread::spawn(move || handle.blocking_wait())
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(value, "from the pool");
    }

    #[tokio::test]
    async fn test_default_handler_sees_failures_of_dropped_handles() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let previous = set_default_failure_handler(Some(Arc::new(move |f: &TaskFailure| {
            sink.lock().unwrap().push(f.to_string());
        })));

        let ex = executor(1, 1, Duration::from_secs(5));
        drop(ex.submit(async { Err::<(), _>(anyhow!("nobody is listening")) }));
        ex.shutdown().await;

        set_default_failure_handler(previous);
        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains("nobody is listening")));
    }
}
