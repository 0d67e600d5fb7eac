//! Background runtime that lets synchronous tree operations await the
//! content provider.
//!
//! Kernel dispatcher threads are plain OS threads. Provisioning needs to await
//! an async provider, so the await happens on a private Tokio runtime owned by
//! a dedicated thread. [`AsyncExecutor::spawn`] hands a task over and returns;
//! [`AsyncExecutor::block_on`] additionally parks the caller on a oneshot
//! receiver until the result arrives.
//!
//! ```text
//! Dispatcher thread               Executor thread
//! ─────────────────               ───────────────
//!     │ submit(future) ──────────────►│
//!     │                               │ spawn task
//!     │ blocking_recv() ◄─────────────│ send result
//! ```
//!
//! Never call `spawn` or `block_on` from inside a Tokio runtime: the blocking
//! channel operations panic there.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while running work on the executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The executor has been shut down or the background thread died.
    #[error("Executor has been shut down")]
    Shutdown,

    /// The operation was cancelled.
    #[error("Operation was cancelled")]
    Cancelled,

    /// The operation did not finish in time.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The timeout that was exceeded.
        duration: Duration,
    },
}

/// Work submitted to the executor thread. The result travels through a typed
/// oneshot captured inside the future.
struct WorkItem {
    work: BoxFuture<'static, ()>,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the async executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of Tokio worker threads.
    pub worker_threads: usize,
    /// Channel buffer size for work submission.
    pub queue_size: usize,
    /// Default timeout applied by `block_on` (None = wait forever).
    pub default_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            queue_size: 256,
            default_timeout: None,
        }
    }
}

impl ExecutorConfig {
    /// Set the number of worker threads.
    ///
    /// # Arguments
    /// * `worker_threads` - Number of Tokio worker threads (at least one is used)
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the submission queue size.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set the default timeout used by `block_on`.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }
}

// ============================================================================
// Async Executor
// ============================================================================

/// Executor running a private multi-thread runtime on its own thread.
pub struct AsyncExecutor {
    /// Channel to submit async work.
    tx: mpsc::Sender<WorkItem>,
    /// Cancels in-flight work and stops the dispatch loop.
    cancel_token: CancellationToken,
    /// Handle to the background thread.
    thread: Option<JoinHandle<()>>,
    /// Cleared once the dispatch loop exits.
    running: Arc<AtomicBool>,
    /// Default timeout for `block_on`.
    default_timeout: Option<Duration>,
}

impl AsyncExecutor {
    /// Build the runtime and start the executor thread.
    ///
    /// # Arguments
    /// * `config` - Executor configuration
    ///
    /// # Returns
    /// The running executor, or the IO error from building the runtime or
    /// spawning its thread.
    pub fn new(config: ExecutorConfig) -> std::io::Result<Self> {
        let rt: tokio::runtime::Runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("dirspider-provider")
            .enable_all()
            .build()?;

        let (tx, rx) = mpsc::channel::<WorkItem>(config.queue_size.max(1));
        let cancel_token: CancellationToken = CancellationToken::new();
        let token: CancellationToken = cancel_token.clone();
        let running: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
        let running_flag: Arc<AtomicBool> = running.clone();

        let thread: JoinHandle<()> = std::thread::Builder::new()
            .name("dirspider-executor".to_string())
            .spawn(move || {
                rt.block_on(async move {
                    let mut rx: mpsc::Receiver<WorkItem> = rx;
                    loop {
                        tokio::select! {
                            biased;

                            _ = token.cancelled() => break,
                            item = rx.recv() => match item {
                                Some(item) => {
                                    tokio::spawn(item.work);
                                }
                                None => break,
                            },
                        }
                    }
                });
                running_flag.store(false, Ordering::Release);
                debug!("executor thread stopped");
            })?;

        Ok(Self {
            tx,
            cancel_token,
            thread: Some(thread),
            running,
            default_timeout: config.default_timeout,
        })
    }

    /// Run `future` to completion, applying the default timeout if one is set.
    pub fn block_on<F, T>(&self, future: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.default_timeout {
            Some(timeout) => self.block_on_timeout(future, timeout),
            None => self.submit(future.map(Ok)),
        }
    }

    /// Run `future` with an explicit deadline.
    ///
    /// # Arguments
    /// * `future` - The async operation to execute
    /// * `timeout` - Maximum time to wait for completion
    ///
    /// # Returns
    /// Ok(result) on success, `Timeout` if the deadline passed, `Cancelled`
    /// if `cancel_all` fired first.
    pub fn block_on_timeout<F, T>(&self, future: F, timeout: Duration) -> Result<T, ExecutorError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token: CancellationToken = self.cancel_token.clone();
        self.submit(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => Err(ExecutorError::Cancelled),
                result = tokio::time::timeout(timeout, future) => {
                    result.map_err(|_| ExecutorError::Timeout { duration: timeout })
                }
            }
        })
    }

    /// Run `future` on the executor without waiting for it.
    ///
    /// The task is dropped unfinished if [`AsyncExecutor::cancel_all`] fires.
    /// Blocks only while the work queue is full.
    ///
    /// # Returns
    /// `Shutdown` if the executor no longer accepts work. The future is
    /// dropped unpolled in that case.
    pub fn spawn<F>(&self, future: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_running() {
            return Err(ExecutorError::Shutdown);
        }

        let token: CancellationToken = self.cancel_token.clone();
        let work: BoxFuture<'static, ()> = async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {}
                _ = future => {}
            }
        }
        .boxed();

        self.tx
            .blocking_send(WorkItem { work })
            .map_err(|_| ExecutorError::Shutdown)
    }

    fn submit<F, T>(&self, future: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = Result<T, ExecutorError>> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_running() {
            return Err(ExecutorError::Shutdown);
        }

        let (result_tx, result_rx) = oneshot::channel::<Result<T, ExecutorError>>();
        let work: BoxFuture<'static, ()> = async move {
            // The caller may have given up already.
            let _ = result_tx.send(future.await);
        }
        .boxed();

        if self.tx.blocking_send(WorkItem { work }).is_err() {
            return Err(ExecutorError::Shutdown);
        }
        result_rx.blocking_recv().unwrap_or(Err(ExecutorError::Shutdown))
    }

    /// Cancel in-flight operations and stop accepting work.
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the dispatch loop is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.cancel_token.is_cancelled()
    }
}

impl Drop for AsyncExecutor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
