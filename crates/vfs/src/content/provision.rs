//! Background provider lookups for new entries.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::provider::{render_hits, ContentProvider};
use crate::error::VfsResult;
use crate::executor::AsyncExecutor;
use crate::options::ProvisionOptions;

/// Lookups spawned but not yet finished.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Holds one slot in [`Pending`] for the life of a lookup, however it ends.
struct PendingGuard(Arc<Pending>);

impl PendingGuard {
    fn new(pending: Arc<Pending>) -> Self {
        *pending.count.lock() += 1;
        Self(pending)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Runs provider lookups on a private runtime and hands the rendered hits to
/// a callback.
///
/// Callers never wait on the provider. Failures never reach them either: a
/// provider error, timeout or shutdown means the callback is not invoked.
pub struct Provisioner {
    provider: Arc<dyn ContentProvider>,
    executor: AsyncExecutor,
    timeout: Duration,
    pending: Arc<Pending>,
}

impl Provisioner {
    /// Start the provider runtime.
    ///
    /// # Arguments
    /// * `provider` - Content source
    /// * `options` - Provisioning options (timeout, worker threads)
    pub fn new(provider: Arc<dyn ContentProvider>, options: &ProvisionOptions) -> VfsResult<Self> {
        let executor: AsyncExecutor = AsyncExecutor::new(options.executor_config())?;
        Ok(Self {
            provider,
            executor,
            timeout: options.timeout(),
            pending: Arc::new(Pending::default()),
        })
    }

    /// Look up `query` in the background.
    ///
    /// `apply` runs on a runtime worker with the rendered hits, and only when
    /// the lookup produced at least one hit.
    ///
    /// # Arguments
    /// * `context` - Ancestor names joined by the separator
    /// * `query` - Search term
    /// * `apply` - Receives the rendered content
    pub fn spawn<A>(&self, context: String, query: String, apply: A)
    where
        A: FnOnce(Vec<u8>) + Send + 'static,
    {
        let guard: PendingGuard = PendingGuard::new(self.pending.clone());
        let provider: Arc<dyn ContentProvider> = self.provider.clone();
        let timeout: Duration = self.timeout;

        let job = async move {
            let _guard: PendingGuard = guard;
            let data: Vec<u8> = lookup(provider.as_ref(), timeout, &context, &query).await;
            if !data.is_empty() {
                apply(data);
            }
        };
        if let Err(e) = self.executor.spawn(job) {
            warn!("provisioning lookup not started: {}", e);
        }
    }

    /// Number of lookups still running.
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Block until every spawned lookup has finished or been dropped.
    pub fn wait_idle(&self) {
        let mut count = self.pending.count.lock();
        while *count > 0 {
            self.pending.idle.wait(&mut count);
        }
    }

    /// Abort in-flight lookups; later spawns are dropped.
    pub fn shutdown(&self) {
        self.executor.cancel_all();
    }
}

/// Query the provider with a deadline and render its hits.
async fn lookup(
    provider: &dyn ContentProvider,
    timeout: Duration,
    context: &str,
    query: &str,
) -> Vec<u8> {
    match tokio::time::timeout(timeout, provider.search(context, query)).await {
        Ok(Ok(hits)) => {
            debug!("provider returned {} hits for {:?}", hits.len(), query);
            render_hits(&hits)
        }
        Ok(Err(e)) => {
            warn!("provisioning {:?} in {:?} failed: {}", query, context, e);
            Vec::new()
        }
        Err(_) => {
            warn!("provisioning {:?} timed out after {:?}", query, timeout);
            Vec::new()
        }
    }
}
