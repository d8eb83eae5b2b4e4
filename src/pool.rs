//! Fixed-capacity worker pool with an immediate, restartable shutdown.
//!
//! Work runs on the ambient Tokio runtime. Each pool *generation* owns a
//! semaphore with `size` permits, a cancellation token and a task tracker.
//! `shutdown_now` swaps in a fresh generation before draining the old one,
//! so the pool never refuses work.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{Field, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    Live,
    /// At least one retired generation is still stopping.
    Draining,
}

#[derive(Debug)]
struct Generation {
    id: u64,
    size: usize,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Generation {
    fn new(id: u64, size: usize) -> Self {
        Self {
            id,
            size,
            permits: Arc::new(Semaphore::new(size)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn stop(&self) {
        self.cancel.cancel();
        self.permits.close();
        self.tracker.close();
    }
}

#[derive(Debug)]
struct PoolState {
    live: Generation,
    next_id: u64,
}

#[derive(Debug)]
pub struct WorkerPool {
    /// Capacity used for the next generation.
    size: AtomicUsize,
    state: Mutex<PoolState>,
    /// Retired generations whose tasks have not all stopped yet.
    draining: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, ScanError> {
        check_size(size)?;
        Ok(Self {
            size: AtomicUsize::new(size),
            state: Mutex::new(PoolState {
                live: Generation::new(0, size),
                next_id: 1,
            }),
            draining: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Capacity of the live generation.
    pub fn size(&self) -> usize {
        self.lock().live.size
    }

    /// Capacity the next generation will be built with.
    pub fn configured_size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Change the capacity of generations created after this call. The live
    /// generation keeps its size until the next `shutdown_now`.
    pub fn set_size(&self, size: usize) -> Result<(), ScanError> {
        check_size(size)?;
        self.size.store(size, Ordering::SeqCst);
        Ok(())
    }

    pub fn phase(&self) -> PoolPhase {
        if self.draining.load(Ordering::SeqCst) > 0 {
            PoolPhase::Draining
        } else {
            PoolPhase::Live
        }
    }

    /// Number of tasks queued or running on the live generation.
    pub fn pending(&self) -> usize {
        self.lock().live.tracker.len()
    }

    /// Queue `task` on the pool. At most `size` tasks run at once; the rest
    /// wait for a permit in submission order.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit<F, T>(&self, task: F) -> PoolHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (permits, cancel, tracker) = {
            let state = self.lock();
            let live = &state.live;
            (live.permits.clone(), live.cancel.clone(), live.tracker.clone())
        };

        let inner = tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                permit = permits.acquire_owned() => permit.ok()?,
            };
            let out = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                out = task => Some(out),
            };
            drop(permit);
            out
        });

        PoolHandle { inner }
    }

    /// Discard queued work, cancel running work and wait until every task of
    /// the current generation has stopped. A fresh generation with the
    /// configured size is installed first, so new submissions are accepted
    /// for the whole duration of the call.
    ///
    /// The concurrency bound holds per generation: until the retired tasks
    /// reach their next await point, they may run alongside up to `size`
    /// tasks of the fresh generation.
    ///
    /// The pool reports [`PoolPhase::Draining`] until the retired generation
    /// has fully stopped, even if this future is dropped before that.
    pub async fn shutdown_now(&self) {
        let retired = {
            let mut state = self.lock();
            let fresh = Generation::new(state.next_id, self.configured_size());
            state.next_id += 1;
            self.draining.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut state.live, fresh)
        };

        info!(
            generation = retired.id,
            pending = retired.tracker.len(),
            "shutting down worker pool"
        );
        retired.stop();

        let id = retired.id;
        let tracker = retired.tracker.clone();
        let draining = self.draining.clone();
        let drained = tokio::spawn(async move {
            tracker.wait().await;
            draining.fetch_sub(1, Ordering::SeqCst);
            debug!(generation = id, "worker pool generation stopped");
        });
        if let Err(e) = drained.await {
            warn!(generation = id, error = %e, "drain watcher failed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.lock().live.stop();
    }
}

fn check_size(size: usize) -> Result<(), ScanError> {
    if size == 0 {
        return Err(ScanError::invalid(
            Field::PoolSize,
            "thread pool size cannot be less than 1",
        ));
    }
    Ok(())
}

/// Deferred result of a pooled task.
///
/// Resolves to `Err(ScanError::Cancelled)` when the task was discarded by a
/// shutdown. Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct PoolHandle<T> {
    inner: JoinHandle<Option<T>>,
}

impl<T> PoolHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<T> Future for PoolHandle<T> {
    type Output = Result<T, ScanError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|joined| match joined {
            Ok(Some(out)) => Ok(out),
            Ok(None) => Err(ScanError::Cancelled),
            Err(e) if e.is_panic() => Err(ScanError::TaskPanicked),
            Err(_) => Err(ScanError::Cancelled),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_size_rejected() {
        let err = WorkerPool::new(0).unwrap_err();
        assert_eq!(err.field(), Some(Field::PoolSize));
        let pool = WorkerPool::new(2).unwrap();
        assert!(pool.set_size(0).is_err());
        assert_eq!(pool.configured_size(), 2);
    }

    #[tokio::test]
    async fn handles_resolve_to_task_output() {
        let pool = WorkerPool::new(2).unwrap();
        let handles: Vec<_> = (0..10u32).map(|i| pool.submit(async move { i * 2 })).collect();
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap());
        }
        assert_eq!(out, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_size() {
        let pool = WorkerPool::new(3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..24)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_and_pool_stays_usable() {
        let pool = WorkerPool::new(1).unwrap();
        let running = pool.submit(tokio::time::sleep(Duration::from_secs(30)));
        let queued = pool.submit(async { 1 });

        pool.shutdown_now().await;
        assert_eq!(running.await, Err(ScanError::Cancelled));
        assert_eq!(queued.await, Err(ScanError::Cancelled));
        assert_eq!(pool.phase(), PoolPhase::Live);

        assert_eq!(pool.submit(async { 7 }).await, Ok(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn phase_reports_draining_until_retired_tasks_stop() {
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let busy = pool.submit(async move {
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(400));
        });
        started_rx.await.unwrap();
        assert_eq!(pool.pending(), 1);
        assert!(!busy.is_finished());
        assert_eq!(pool.phase(), PoolPhase::Live);

        let shutdown = tokio::spawn({
            let pool = pool.clone();
            async move { pool.shutdown_now().await }
        });
        tokio::time::timeout(Duration::from_secs(1), async {
            while pool.phase() != PoolPhase::Draining {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("pool entered draining");

        // The fresh generation takes work while the old one is stopping.
        assert_eq!(pool.submit(async { 3 }).await, Ok(3));
        assert_eq!(pool.phase(), PoolPhase::Draining);

        shutdown.await.unwrap();
        assert_eq!(pool.phase(), PoolPhase::Live);
        assert!(busy.is_finished());
        assert_eq!(busy.await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dropped_shutdown_keeps_draining_until_tasks_stop() {
        let pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let busy = pool.submit(async move {
            let _ = started_tx.send(());
            std::thread::sleep(Duration::from_millis(300));
        });
        started_rx.await.unwrap();

        let early = tokio::time::timeout(Duration::from_millis(20), pool.shutdown_now()).await;
        assert!(early.is_err());
        assert_eq!(pool.phase(), PoolPhase::Draining);

        busy.await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while pool.phase() != PoolPhase::Live {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pool returned to live");
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn resize_applies_to_next_generation() {
        let pool = WorkerPool::new(2).unwrap();
        pool.set_size(5).unwrap();
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.configured_size(), 5);
        pool.shutdown_now().await;
        assert_eq!(pool.size(), 5);
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let pool = WorkerPool::new(1).unwrap();
        let h = pool.submit(async { panic!("boom") });
        assert_eq!(h.await, Err::<(), _>(ScanError::TaskPanicked));
        assert_eq!(pool.submit(async { 1 }).await, Ok(1));
    }
}
