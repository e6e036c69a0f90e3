//! Bounded scheduler for invocation workloads.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use action_config::KernelConfig;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

/// Maximum number of invocations evaluated at the same time.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    max_concurrency: NonZeroUsize,
}

impl SchedulerConfig {
    /// Creates a new configuration with the supplied concurrency limit.
    #[must_use]
    pub const fn new(max_concurrency: NonZeroUsize) -> Self {
        Self { max_concurrency }
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub const fn max_concurrency(self) -> NonZeroUsize {
        self.max_concurrency
    }
}

impl From<KernelConfig> for SchedulerConfig {
    fn from(config: KernelConfig) -> Self {
        Self::new(config.max_concurrent_invocations())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        KernelConfig::default().into()
    }
}

/// Wrapper around `tokio::spawn` that bounds how many tasks run at once.
///
/// Tasks are spawned immediately and wait for a permit inside the runtime, so
/// submission never blocks the caller.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Constructs a scheduler using the provided configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let permits = config.max_concurrency().get();
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Returns the number of permits currently free.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns `true` if the scheduler has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the scheduler. Queued tasks that have not obtained a permit
    /// resolve to [`SchedulerError::Closed`]; running tasks are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.semaphore.close();
    }

    /// Spawns a future, respecting the configured concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] when the scheduler is closed before the
    /// task is enqueued. The returned task resolves to the same error if the
    /// scheduler closes while it waits for a permit.
    pub fn spawn<F, T>(&self, future: F) -> SchedulerResult<JoinHandle<SchedulerResult<T>>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let semaphore = Arc::clone(&self.semaphore);

        let handle = tokio::spawn(async move {
            let Ok(permit) = semaphore.acquire_owned().await else {
                trace!("scheduler closed while task awaited a permit");
                return Err(SchedulerError::Closed);
            };
            let output = future.await;
            drop(permit);
            Ok(output)
        });

        Ok(handle)
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// Scheduler is closed and will not run new tasks.
    #[error("scheduler closed")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn respects_max_concurrency() {
        let config = SchedulerConfig::new(NonZeroUsize::new(2).unwrap());
        let scheduler = TaskScheduler::new(config);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(
                scheduler
                    .spawn(async move {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            );
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.available_permits(), 2);
    }

    #[tokio::test]
    async fn close_prevents_new_tasks() {
        let scheduler = TaskScheduler::default();
        scheduler.close();

        let result = scheduler.spawn(async move {});
        assert_eq!(result.unwrap_err(), SchedulerError::Closed);
    }

    #[tokio::test]
    async fn close_releases_queued_tasks_with_an_error() {
        let scheduler = TaskScheduler::new(SchedulerConfig::new(NonZeroUsize::new(1).unwrap()));
        let (release, hold) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started) = tokio::sync::oneshot::channel::<()>();

        let running = scheduler
            .spawn(async move {
                let _ = started_tx.send(());
                let _ = hold.await;
            })
            .unwrap();
        started.await.unwrap();
        let queued = scheduler.spawn(async move { 7 }).unwrap();

        scheduler.close();
        let _ = release.send(());

        assert_eq!(queued.await.unwrap(), Err(SchedulerError::Closed));
        assert_eq!(running.await.unwrap(), Ok(()));
    }

    #[test]
    fn config_follows_kernel_settings() {
        let kernel = KernelConfig::new(NonZeroUsize::new(5).unwrap(), false);
        assert_eq!(SchedulerConfig::from(kernel).max_concurrency().get(), 5);
    }
}
