//! Lock-free hand-off of immutable snapshots to the audio thread.
//!
//! The control side pushes `Arc<T>` snapshots into a bounded SPSC ring. At each block boundary the
//! audio side drains the ring, keeps the newest snapshot and retires the ones it replaced into a
//! second ring that the [`ReleasePool`] empties off the realtime path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use crate::release_pool::ReleasePool;

/// Default capacity of the publication ring.
pub const DEFAULT_PUBLISH_CAPACITY: usize = 20;

/// Default capacity of the retire ring.
pub const DEFAULT_RETIRE_CAPACITY: usize = 512;

/// Control-thread end of a publication channel.
pub struct Publisher<T: Send + Sync + 'static> {
    producer: HeapProd<Arc<T>>,
    pool: ReleasePool<T>,
    retire_overflows: Arc<AtomicU32>,
}

/// Audio-thread end of a publication channel. Holds the active snapshot.
pub struct Subscriber<T: Send + Sync + 'static> {
    consumer: HeapCons<Arc<T>>,
    retire: HeapProd<Arc<T>>,
    current: Option<Arc<T>>,
    retire_overflows: Arc<AtomicU32>,
}

/// Creates a publication channel whose retired snapshots are reclaimed by `pool`.
pub fn publication_channel<T: Send + Sync + 'static>(
    pool: &ReleasePool<T>,
) -> (Publisher<T>, Subscriber<T>) {
    publication_channel_with_capacity(pool, DEFAULT_PUBLISH_CAPACITY, DEFAULT_RETIRE_CAPACITY)
}

pub fn publication_channel_with_capacity<T: Send + Sync + 'static>(
    pool: &ReleasePool<T>,
    capacity: usize,
    retire_capacity: usize,
) -> (Publisher<T>, Subscriber<T>) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    let (retire, retired) = HeapRb::new(retire_capacity.max(1)).split();
    pool.add_retire_queue(retired);

    let retire_overflows = Arc::new(AtomicU32::new(0));
    (
        Publisher {
            producer,
            pool: pool.clone(),
            retire_overflows: Arc::clone(&retire_overflows),
        },
        Subscriber {
            consumer,
            retire,
            current: None,
            retire_overflows,
        },
    )
}

impl<T: Send + Sync + 'static> Publisher<T> {
    /// Registers `snapshot` with the pool and queues it for the audio thread.
    ///
    /// Returns `false` when the ring is full; the audio thread keeps its previous snapshot.
    pub fn publish(&mut self, snapshot: Arc<T>) -> bool {
        self.pool.register(&snapshot);
        match self.producer.try_push(snapshot) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    capacity = self.producer.capacity().get(),
                    "publication ring full, keeping previous snapshot"
                );
                false
            }
        }
    }

    /// Number of snapshots not yet picked up by the audio thread.
    pub fn pending(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Retire pushes that found the retire ring full since the last call.
    pub fn take_retire_overflows(&self) -> u32 {
        self.retire_overflows.swap(0, Ordering::AcqRel)
    }
}

impl<T: Send + Sync + 'static> Subscriber<T> {
    /// Swaps in the newest published snapshot, retiring everything it replaces.
    ///
    /// Returns `true` when the active snapshot changed. Realtime-safe.
    #[inline]
    pub fn try_pop_newest(&mut self) -> bool {
        let mut changed = false;
        while let Some(next) = self.consumer.try_pop() {
            if let Some(previous) = self.current.replace(next) {
                self.retire(previous);
            }
            changed = true;
        }
        changed
    }

    #[inline]
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// Drops the active snapshot (retiring it).
    #[inline]
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            self.retire(previous);
        }
    }

    #[inline]
    fn retire(&mut self, snapshot: Arc<T>) {
        if let Err(snapshot) = self.retire.try_push(snapshot) {
            // The pool still holds a reference, so this only decrements the count.
            drop(snapshot);
            self.retire_overflows.fetch_add(1, Ordering::Relaxed);
        }
    }
}
