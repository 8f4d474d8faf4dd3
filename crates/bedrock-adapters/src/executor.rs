//! Executor backed by a private tokio runtime.

use bedrock_core::codes::thread;
use bedrock_core::{task_channel, try_catch, ErrorInfo, Executor, Result, Task, TaskCompleter, TaskHandle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

const MODULE: &str = "thread";

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Threads that run submitted tasks.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Prefix of worker thread names.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Upper bound on `shutdown(true)`, in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn default_thread_name() -> String {
    "bedrock-worker".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name: default_thread_name(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Counters shared with in-flight tasks.
#[derive(Debug, Default)]
struct TaskCounters {
    pending: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Decrements the pending count however the task ends, including when a
/// delayed task is dropped by runtime shutdown before it starts.
struct PendingGuard(Arc<TaskCounters>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// [`Executor`] that runs tasks on the blocking pool of its own tokio
/// runtime.
///
/// Tasks are synchronous closures; a panicking task is reported to its
/// [`TaskHandle`] as `INTERNAL_ERROR` and does not take a worker down.
/// Call [`shutdown`](Executor::shutdown) from outside the executor's own
/// tasks.
pub struct TokioExecutor {
    runtime: Mutex<Option<Runtime>>,
    running: AtomicBool,
    worker_threads: usize,
    shutdown_timeout: Duration,
    counters: Arc<TaskCounters>,
}

impl TokioExecutor {
    /// Builds the runtime and starts accepting tasks.
    ///
    /// # Errors
    ///
    /// `INVALID_POOL_SIZE` for zero worker threads, `IO_ERROR` if the
    /// runtime cannot be built.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        if config.worker_threads == 0 {
            return Err(ErrorInfo::new(
                thread::INVALID_POOL_SIZE,
                "executor needs at least one worker thread",
                MODULE,
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()
            .map_err(|e| ErrorInfo::from_io(&e, MODULE))?;

        info!(
            worker_threads = config.worker_threads,
            thread_name = %config.thread_name,
            "Executor started"
        );

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            running: AtomicBool::new(true),
            worker_threads: config.worker_threads,
            shutdown_timeout: config.shutdown_timeout(),
            counters: Arc::new(TaskCounters::default()),
        })
    }

    /// Creates an executor with default configuration.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_defaults() -> Result<Self> {
        Self::new(ExecutorConfig::default())
    }

    /// Tasks that ran to completion.
    #[must_use]
    pub fn tasks_completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked.
    #[must_use]
    pub fn tasks_failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Stops accepting tasks and waits at most `limit`, capped by the
    /// configured shutdown timeout, for started tasks. Tasks still running
    /// after that are left to finish on their own threads. A zero `limit`
    /// does not wait.
    pub fn shutdown_within(&self, limit: Duration) {
        let wait = limit.min(self.shutdown_timeout);
        self.stop((!wait.is_zero()).then_some(wait));
    }

    fn stop(&self, wait: Option<Duration>) {
        self.running.store(false, Ordering::Release);

        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };

        info!(
            pending = self.pending_tasks(),
            wait = ?wait,
            "Stopping executor..."
        );

        match wait {
            // Started tasks finish; delayed tasks still sleeping are dropped.
            Some(timeout) => runtime.shutdown_timeout(timeout),
            None => runtime.shutdown_background(),
        }

        debug!(
            completed = self.tasks_completed(),
            failed = self.tasks_failed(),
            "Executor stopped"
        );
    }

    fn shut_down_error() -> ErrorInfo {
        ErrorInfo::new(thread::POOL_SHUTDOWN, "executor has been shut down", MODULE)
    }

    fn dispatch(&self, task: Task, delay: Option<Duration>) -> Result<TaskHandle> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Self::shut_down_error());
        }

        let runtime = self.runtime.lock();
        let Some(runtime) = runtime.as_ref() else {
            return Err(Self::shut_down_error());
        };

        let (completer, handle) = task_channel();
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        let pending = PendingGuard(Arc::clone(&self.counters));

        match delay {
            None => {
                runtime.spawn_blocking(move || run_task(task, completer, pending));
            }
            Some(delay) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    // The blocking task owns the guard and completer from here on.
                    let _ = tokio::task::spawn_blocking(move || run_task(task, completer, pending)).await;
                });
            }
        }

        Ok(handle)
    }
}

fn run_task(task: Task, completer: TaskCompleter, pending: PendingGuard) {
    let outcome = try_catch(task, MODULE);
    match &outcome {
        Ok(()) => {
            pending.0.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            pending.0.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Task panicked");
        }
    }
    drop(pending);
    completer.complete(outcome);
}

impl Executor for TokioExecutor {
    fn submit(&self, task: Task) -> Result<TaskHandle> {
        self.dispatch(task, None)
    }

    fn submit_delayed(&self, task: Task, delay: Duration) -> Result<TaskHandle> {
        self.dispatch(task, Some(delay))
    }

    fn worker_count(&self) -> usize {
        self.worker_threads
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn pending_tasks(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    fn shutdown(&self, wait_for_completion: bool) {
        self.stop(wait_for_completion.then_some(self.shutdown_timeout));
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_core::codes::common;
    use std::sync::mpsc;

    fn executor(workers: usize) -> TokioExecutor {
        TokioExecutor::new(ExecutorConfig::default().with_worker_threads(workers)).unwrap()
    }

    #[test]
    fn test_submit_runs_task() {
        let executor = executor(2);
        let (tx, rx) = mpsc::channel();
        let handle = executor.submit(Box::new(move || tx.send(7).unwrap())).unwrap();

        handle.wait().unwrap();
        assert_eq!(rx.recv().unwrap(), 7);
        assert_eq!(executor.tasks_completed(), 1);
        assert_eq!(executor.pending_tasks(), 0);
        executor.shutdown(true);
    }

    #[test]
    fn test_panicking_task_reports_internal_error() {
        let executor = executor(1);
        let handle = executor.submit(Box::new(|| panic!("task exploded"))).unwrap();

        let err = handle.wait().unwrap_err();
        assert_eq!(err.code(), common::INTERNAL_ERROR);
        assert_eq!(err.message(), "task exploded");
        assert_eq!(executor.tasks_failed(), 1);

        // The worker survives.
        executor.submit(Box::new(|| {})).unwrap().wait().unwrap();
        executor.shutdown(true);
    }

    #[test]
    fn test_submit_delayed_waits() {
        let executor = executor(1);
        let started = std::time::Instant::now();
        executor
            .submit_delayed(Box::new(|| {}), Duration::from_millis(30))
            .unwrap()
            .wait()
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        executor.shutdown(false);
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let executor = executor(1);
        assert!(executor.is_running());
        executor.shutdown(true);
        assert!(!executor.is_running());

        let err = executor.submit(Box::new(|| {})).unwrap_err();
        assert_eq!(err.code(), thread::POOL_SHUTDOWN);
        assert_eq!(err.module(), "thread");

        // Second shutdown is a no-op.
        executor.shutdown(true);
    }

    #[test]
    fn test_shutdown_cancels_sleeping_delayed_tasks() {
        let executor = executor(1);
        let handle = executor
            .submit_delayed(Box::new(|| {}), Duration::from_secs(60))
            .unwrap();
        assert_eq!(executor.pending_tasks(), 1);

        executor.shutdown(true);
        let err = handle.wait().unwrap_err();
        assert_eq!(err.code(), common::CANCELLED);
    }

    #[test]
    fn test_shutdown_within_stops_waiting_at_limit() {
        let executor = executor(1);
        let (started_tx, started_rx) = mpsc::channel();
        executor
            .submit(Box::new(move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_secs(3));
            }))
            .unwrap();
        started_rx.recv().unwrap();

        let started = std::time::Instant::now();
        executor.shutdown_within(Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!executor.is_running());

        // Already stopped.
        executor.shutdown_within(Duration::from_secs(5));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = TokioExecutor::new(ExecutorConfig::default().with_worker_threads(0))
            .err()
            .unwrap();
        assert_eq!(err.code(), thread::INVALID_POOL_SIZE);
    }

    #[test]
    fn test_worker_count_and_trait_object() {
        let executor: Arc<dyn Executor> = Arc::new(executor(3));
        assert_eq!(executor.worker_count(), 3);

        let handles: Vec<_> = (0..10)
            .map(|_| executor.submit(Box::new(|| std::thread::sleep(Duration::from_millis(1)))).unwrap())
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        executor.shutdown(true);
    }
}
