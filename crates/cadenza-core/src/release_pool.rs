//! Deferred reclamation of snapshots shared with the audio thread.
//!
//! The audio thread never frees a published snapshot. Every snapshot is registered here before it
//! is handed over, so the pool always owns a reference; the audio thread only ever drops a
//! non-final reference. A sweep (manual or on the sweeper thread) releases every snapshot nobody
//! else references any more.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons};

use crate::{Error, Result};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(1000);

pub struct ReleasePool<T: Send + Sync + 'static> {
    inner: Arc<PoolInner<T>>,
}

struct PoolInner<T> {
    held: Mutex<Vec<Arc<T>>>,
    retire_queues: Mutex<Vec<HeapCons<Arc<T>>>>,
}

impl<T: Send + Sync + 'static> Clone for ReleasePool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for ReleasePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> ReleasePool<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                held: Mutex::new(Vec::new()),
                retire_queues: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Takes a reference to `value` (control thread, before publishing it).
    pub fn register(&self, value: &Arc<T>) {
        self.inner.held.lock().push(Arc::clone(value));
    }

    /// Attaches the consumer end of an audio-thread retire queue.
    pub fn add_retire_queue(&self, queue: HeapCons<Arc<T>>) {
        self.inner.retire_queues.lock().push(queue);
    }

    /// Number of attached retire queues.
    pub fn retire_queues(&self) -> usize {
        self.inner.retire_queues.lock().len()
    }

    /// Number of snapshots currently held.
    pub fn len(&self) -> usize {
        self.inner.held.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the retire queues and frees every snapshot only the pool still references.
    ///
    /// Returns the number of snapshots freed.
    pub fn sweep(&self) -> usize {
        {
            let mut queues = self.inner.retire_queues.lock();
            for queue in queues.iter_mut() {
                while let Some(retired) = queue.try_pop() {
                    drop(retired);
                }
            }
            // Queues whose engine is gone will never be written again.
            queues.retain(|queue| queue.write_is_held());
        }

        let mut held = self.inner.held.lock();
        let before = held.len();

        held.sort_unstable_by_key(|value| Arc::as_ptr(value) as usize);
        held.dedup_by(|a, b| Arc::ptr_eq(a, b));
        held.retain(|value| Arc::strong_count(value) > 1);
        let freed = before - held.len();

        if freed > 0 {
            tracing::debug!(freed, held = held.len(), "release pool swept");
        }
        freed
    }

    /// Spawns a thread sweeping every `interval`. Dropping the guard stops and joins it.
    pub fn start_sweeper(&self, interval: Duration) -> Result<SweeperGuard> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let pool = self.clone();

        let handle = thread::Builder::new()
            .name("cadenza-release-pool".into())
            .spawn(move || {
                tracing::info!(?interval, "release pool sweeper started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            pool.sweep();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                pool.sweep();
                tracing::info!("release pool sweeper stopped");
            })
            .map_err(|e| Error::ThreadSpawn {
                name: "release pool sweeper".into(),
                reason: e.to_string(),
            })?;

        Ok(SweeperGuard {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

/// Keeps the sweeper thread alive.
pub struct SweeperGuard {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweeperGuard {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::HeapRb;

    #[test]
    fn test_sweep_frees_unreferenced() {
        let pool = ReleasePool::new();
        let kept = Arc::new(1u32);
        let dropped = Arc::new(2u32);
        pool.register(&kept);
        pool.register(&dropped);
        drop(dropped);

        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.len(), 1);

        drop(kept);
        assert_eq!(pool.sweep(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_sweep_dedupes_by_pointer() {
        let pool = ReleasePool::new();
        let value = Arc::new(7u32);
        pool.register(&value);
        pool.register(&value);
        assert_eq!(pool.len(), 2);

        pool.sweep();
        assert_eq!(pool.len(), 1);
        assert_eq!(Arc::strong_count(&value), 2);
    }

    #[test]
    fn test_retired_handles_are_released() {
        let pool = ReleasePool::new();
        let (mut prod, cons) = HeapRb::<Arc<u32>>::new(4).split();
        pool.add_retire_queue(cons);

        let value = Arc::new(3u32);
        pool.register(&value);
        assert!(prod.try_push(value).is_ok());

        assert_eq!(pool.sweep(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_orphaned_retire_queues_are_pruned() {
        let pool = ReleasePool::new();
        let (mut live, live_cons) = HeapRb::<Arc<u32>>::new(4).split();
        let (mut gone, gone_cons) = HeapRb::<Arc<u32>>::new(4).split();
        pool.add_retire_queue(live_cons);
        pool.add_retire_queue(gone_cons);

        let value = Arc::new(9u32);
        pool.register(&value);
        assert!(gone.try_push(value).is_ok());
        drop(gone);

        // Whatever the dropped producer left behind is drained first.
        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.retire_queues(), 1);

        let value = Arc::new(10u32);
        pool.register(&value);
        assert!(live.try_push(value).is_ok());
        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.retire_queues(), 1);
    }

    #[test]
    fn test_sweep_collapses_many_duplicates() {
        let pool = ReleasePool::new();
        let values: Vec<_> = (0..64u32).map(Arc::new).collect();
        for _ in 0..4 {
            for value in &values {
                pool.register(value);
            }
        }
        assert_eq!(pool.len(), 256);

        assert_eq!(pool.sweep(), 192);
        assert_eq!(pool.len(), 64);
        assert!(values.iter().all(|value| Arc::strong_count(value) == 2));
    }

    #[test]
    fn test_sweeper_thread_stops_on_drop() {
        let pool = ReleasePool::new();
        let value = Arc::new(5u32);
        pool.register(&value);
        drop(value);

        let guard = pool.start_sweeper(Duration::from_millis(5)).unwrap();
        drop(guard);
        assert!(pool.is_empty());
    }
}
