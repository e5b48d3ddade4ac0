//! Uniform replay buffer: Storage Ring + collate + optional prefetch.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::ReplayBufferConfig;
use crate::device::{HasDevice, Pinnable};
use crate::error::{ClonedResult, ReplayError, Result};
use crate::metrics::{MetricsSnapshot, ReplayMetrics};
use crate::prefetch::{PrefetchQueue, ThreadPool};
use crate::storage::StorageRing;
use crate::collate::Collate;

struct Shared<T, C> {
    ring: Mutex<StorageRing<T>>,
    collate: C,
    pin_memory: bool,
    metrics: ReplayMetrics,
}

struct Prefetch<B> {
    pool: ThreadPool,
    queue: Mutex<PrefetchQueue<Result<B>>>,
}

/// Bounded, content-agnostic, concurrent sample store drawing uniformly
/// with replacement.
///
/// `T` is the opaque payload type, `C` the injected collate strategy,
/// `B` the batch type `C` produces.
pub struct ReplayBuffer<T, C, B> {
    shared: Arc<Shared<T, C>>,
    prefetch: Option<Prefetch<B>>,
}

impl<T, C, B> ReplayBuffer<T, C, B>
where
    T: Clone + Send + 'static,
    C: Collate<T, B> + Send + Sync + 'static,
    B: HasDevice + Pinnable + Send + 'static,
{
    /// Construct a buffer from `config`, using `collate` to assemble
    /// sampled batches.
    pub fn new(config: ReplayBufferConfig, collate: C) -> Self {
        let shared = Arc::new(Shared {
            ring: Mutex::new(StorageRing::new(config.capacity)),
            collate,
            pin_memory: config.pin_memory,
            metrics: ReplayMetrics::new(),
        });
        let prefetch = config.prefetch.map(|cap| Prefetch {
            pool: ThreadPool::for_prefetch(cap),
            queue: Mutex::new(PrefetchQueue::new(cap)),
        });
        Self { shared, prefetch }
    }

    /// Fixed maximum number of payloads retained.
    pub fn capacity(&self) -> usize {
        self.shared.ring.lock().capacity()
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.shared.ring.lock().len()
    }

    /// Whether the buffer currently holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observability snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Place a single payload at the write cursor. O(1).
    pub fn add(&self, payload: T) -> usize {
        let slot = self.shared.ring.lock().add(payload);
        self.shared.metrics.record_insert(1);
        tracing::trace!(slot, "replay buffer add");
        slot
    }

    /// Write a batch of payloads starting at the write cursor,
    /// wrapping if necessary.
    pub fn extend(&self, payloads: Vec<T>) -> Result<Vec<usize>> {
        let count = payloads.len() as u64;
        let slots = self.shared.ring.lock().extend(payloads)?;
        self.shared.metrics.record_insert(count);
        tracing::trace!(count, "replay buffer extend");
        Ok(slots)
    }

    /// Fetch the raw payload at `index`. Fails with
    /// [`ReplayError::OutOfRange`] if `index >= len()`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.shared.ring.lock().get(index).cloned()
    }

    /// Fetch and collate the payloads at `indices`, optionally pinning
    /// the result.
    pub fn get_many(&self, indices: &[usize]) -> Result<B> {
        let items = {
            let ring = self.shared.ring.lock();
            indices
                .iter()
                .map(|&i| ring.get(i).cloned())
                .collect::<Result<Vec<_>>>()?
        };
        self.collate_and_pin(items)
    }

    /// Draw `k` indices uniformly with replacement from `[0, len)`,
    /// gather and collate their payloads, and optionally pin the
    /// result. If prefetch is enabled, serves the head of the
    /// prefetch queue (or samples inline on a miss) and refills the
    /// queue before returning.
    pub fn sample(&self, k: usize) -> Result<B> {
        match &self.prefetch {
            None => {
                let result = Self::sample_inline(&self.shared, k);
                self.shared.metrics.record_sample(false);
                result
            }
            Some(prefetch) => self.sample_with_prefetch(prefetch, k),
        }
    }

    fn sample_with_prefetch(&self, prefetch: &Prefetch<B>, k: usize) -> Result<B> {
        let mut queue = prefetch.queue.lock();
        let (ret, from_prefetch) = match queue.pop() {
            Some(fut) => (fut.wait(), true),
            None => (Self::sample_inline(&self.shared, k), false),
        };
        self.shared.metrics.record_sample(from_prefetch);

        while queue.len() < queue.capacity() {
            let shared = Arc::clone(&self.shared);
            queue.push_spawn(&prefetch.pool, move || Self::sample_inline(&shared, k));
        }
        ret
    }

    fn sample_inline(shared: &Arc<Shared<T, C>>, k: usize) -> Result<B> {
        let len = shared.ring.lock().len();
        if len == 0 {
            return Err(ReplayError::invalid_state("cannot sample from an empty buffer"));
        }
        let indices: Vec<usize> = {
            let mut rng = rand::thread_rng();
            (0..k).map(|_| rng.gen_range(0..len)).collect()
        };
        let items = {
            let ring = shared.ring.lock();
            indices
                .iter()
                .map(|&i| ring.get(i).cloned())
                .collect::<Result<Vec<_>>>()?
        };
        let batch = shared.collate.collate(items)?;
        crate::device::maybe_pin(batch, shared.pin_memory)
    }

    fn collate_and_pin(&self, items: Vec<T>) -> Result<B> {
        let batch = self.shared.collate.collate(items)?;
        crate::device::maybe_pin(batch, self.shared.pin_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collate::{Record, RecordCollate};

    fn config(capacity: usize) -> ReplayBufferConfig {
        ReplayBufferConfig::new(capacity).unwrap()
    }

    fn record(v: f32) -> Record {
        let mut r = Record::new();
        r.insert("x".into(), vec![v]);
        r
    }

    #[test]
    fn add_then_get_round_trips() {
        let buf = ReplayBuffer::new(config(4), RecordCollate);
        let slot = buf.add(record(1.0));
        assert_eq!(buf.get(slot).unwrap()["x"], vec![1.0]);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn overwrite_follows_fifo_order() {
        let buf = ReplayBuffer::new(config(2), RecordCollate);
        buf.add(record(1.0));
        buf.add(record(2.0));
        buf.add(record(3.0));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.get(0).unwrap()["x"], vec![3.0]);
        assert_eq!(buf.get(1).unwrap()["x"], vec![2.0]);
    }

    #[test]
    fn get_out_of_range() {
        let buf: ReplayBuffer<Record, RecordCollate, _> = ReplayBuffer::new(config(4), RecordCollate);
        assert!(matches!(buf.get(0), Err(ReplayError::OutOfRange { index: 0, len: 0 })));
    }

    #[test]
    fn sample_on_empty_buffer_fails() {
        let buf: ReplayBuffer<Record, RecordCollate, _> = ReplayBuffer::new(config(4), RecordCollate);
        assert!(buf.sample(2).is_err());
    }

    #[test]
    fn sample_returns_indices_within_range() {
        let buf = ReplayBuffer::new(config(4), RecordCollate);
        for i in 0..4 {
            buf.add(record(i as f32));
        }
        let batch = buf.sample(10).unwrap();
        assert_eq!(batch["x"].rows, 10);
        for v in &batch["x"].data {
            assert!(*v >= 0.0 && *v < 4.0);
        }
    }

    #[test]
    fn prefetch_serves_fifo_and_stays_in_range() {
        let cfg = config(8).with_prefetch(2).unwrap();
        let buf = ReplayBuffer::new(cfg, RecordCollate);
        for i in 0..8 {
            buf.add(record(i as f32));
        }
        for _ in 0..20 {
            let batch = buf.sample(4).unwrap();
            assert_eq!(batch["x"].rows, 4);
        }
        let snap = buf.metrics();
        assert_eq!(snap.samples, 20);
    }
}
