//! Prioritized replay buffer: storage ring plus a pair of segment trees
//! tracking `(priority + eps) ^ alpha` per slot, drawn from with an
//! inverse-CDF scan and reweighted by importance-sampling weights.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::collate::Collate;
use crate::config::PrioritizedConfig;
use crate::device::{HasDevice, Pinnable};
use crate::error::{ClonedResult, ReplayError, Result};
use crate::metrics::{MetricsSnapshot, ReplayMetrics};
use crate::prefetch::{PrefetchQueue, ThreadPool};
use crate::segment_tree::{MinTree, SumTree};
use crate::storage::StorageRing;

struct Inner<T> {
    ring: StorageRing<T>,
    sum_tree: SumTree,
    min_tree: MinTree,
    max_priority: f64,
}

struct Shared<T, C> {
    inner: Mutex<Inner<T>>,
    collate: C,
    pin_memory: bool,
    alpha: f64,
    beta: f64,
    eps: f64,
    metrics: ReplayMetrics,
}

struct Prefetch<R> {
    pool: ThreadPool,
    queue: Mutex<PrefetchQueue<R>>,
}

/// A sampled batch alongside the slot indices it was drawn from and
/// their importance-sampling weights, needed to later call
/// [`PrioritizedBuffer::update_priority`] and to correct the training
/// loss for the non-uniform sampling distribution.
#[derive(Debug, Clone)]
pub struct PrioritizedSample<B> {
    /// The collated batch.
    pub batch: B,
    /// The ring slot each row in `batch` was drawn from, in order.
    pub indices: Vec<usize>,
    /// `w_i = (priority_i / min_priority) ^ (-beta)`, in the same order
    /// as `indices`.
    pub weights: Vec<f64>,
}

/// Prioritized variant of [`crate::buffer::ReplayBuffer`]: sampling
/// probability is proportional to `(priority + eps) ^ alpha` instead of
/// uniform, implemented with a pair of segment trees over the same ring
/// slots as the storage.
pub struct PrioritizedBuffer<T, C, B> {
    shared: Arc<Shared<T, C>>,
    prefetch: Option<Prefetch<Result<PrioritizedSample<B>>>>,
}

impl<T, C, B> PrioritizedBuffer<T, C, B>
where
    T: Clone + Send + 'static,
    C: Collate<T, B> + Send + Sync + 'static,
    B: HasDevice + Pinnable + Send + 'static,
{
    /// Construct a buffer from `config`, using `collate` to assemble
    /// sampled batches.
    pub fn new(config: PrioritizedConfig, collate: C) -> Self {
        let capacity = config.capacity();
        let inner = Inner {
            ring: StorageRing::new(capacity),
            sum_tree: SumTree::new(capacity),
            min_tree: MinTree::new(capacity),
            max_priority: crate::constants::DEFAULT_MAX_PRIORITY,
        };
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            collate,
            pin_memory: config.base.pin_memory,
            alpha: config.alpha,
            beta: config.beta,
            eps: config.eps,
            metrics: ReplayMetrics::new(),
        });
        let prefetch = config.base.prefetch.map(|cap| Prefetch {
            pool: ThreadPool::for_prefetch(cap),
            queue: Mutex::new(PrefetchQueue::new(cap)),
        });
        Self { shared, prefetch }
    }

    /// Fixed maximum number of payloads retained.
    pub fn capacity(&self) -> usize {
        self.shared.inner.lock().ring.capacity()
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().ring.len()
    }

    /// Whether the buffer currently holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observability snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Place a single payload at the write cursor, seeding its priority
    /// with the current `max_priority` high-watermark. O(log capacity).
    pub fn add(&self, payload: T) -> usize {
        let mut inner = self.shared.inner.lock();
        let rho = Self::transform(inner.max_priority, self.shared.eps, self.shared.alpha);
        let slot = inner.ring.add(payload);
        inner.sum_tree.set(slot, rho);
        inner.min_tree.set(slot, rho);
        drop(inner);
        self.shared.metrics.record_insert(1);
        tracing::trace!(slot, "prioritized buffer add");
        slot
    }

    /// Place a single payload at the write cursor with an explicit raw
    /// `priority`. Fails with [`ReplayError::InvalidArgument`] if
    /// `priority` is negative.
    pub fn add_with_priority(&self, payload: T, priority: f64) -> Result<usize> {
        if priority < 0.0 {
            return Err(ReplayError::invalid_argument(format!(
                "priority must be non-negative, got {priority}"
            )));
        }
        let mut inner = self.shared.inner.lock();
        let rho = Self::transform(priority, self.shared.eps, self.shared.alpha);
        let slot = inner.ring.add(payload);
        inner.sum_tree.set(slot, rho);
        inner.min_tree.set(slot, rho);
        if priority > inner.max_priority {
            inner.max_priority = priority;
        }
        drop(inner);
        self.shared.metrics.record_insert(1);
        tracing::trace!(slot, "prioritized buffer add_with_priority");
        Ok(slot)
    }

    /// Write a batch of payloads, each seeded with the current
    /// `max_priority` high-watermark.
    pub fn extend(&self, payloads: Vec<T>) -> Result<Vec<usize>> {
        let count = payloads.len() as u64;
        let mut inner = self.shared.inner.lock();
        let rho = Self::transform(inner.max_priority, self.shared.eps, self.shared.alpha);
        let slots = inner.ring.extend(payloads)?;
        for &slot in &slots {
            inner.sum_tree.set(slot, rho);
            inner.min_tree.set(slot, rho);
        }
        drop(inner);
        self.shared.metrics.record_insert(count);
        tracing::trace!(count, "prioritized buffer extend");
        Ok(slots)
    }

    /// Write a batch of payloads with explicit raw priorities.
    /// `priorities` must be either a single value (broadcast to every
    /// payload) or the same length as `payloads`; otherwise fails with
    /// [`ReplayError::InvalidArgument`], as does any negative priority.
    pub fn extend_with_priorities(&self, payloads: Vec<T>, priorities: &[f64]) -> Result<Vec<usize>> {
        let count = payloads.len();
        if priorities.len() != 1 && priorities.len() != count {
            return Err(ReplayError::invalid_argument(
                "priorities must have length 1 or match the payload batch length",
            ));
        }
        if let Some(&p) = priorities.iter().find(|&&p| p < 0.0) {
            return Err(ReplayError::invalid_argument(format!(
                "priority must be non-negative, got {p}"
            )));
        }
        let mut inner = self.shared.inner.lock();
        let slots = inner.ring.extend(payloads)?;
        let max_observed = priorities.iter().cloned().fold(f64::MIN, f64::max);
        for (pos, &slot) in slots.iter().enumerate() {
            let priority = if priorities.len() == 1 { priorities[0] } else { priorities[pos] };
            let rho = Self::transform(priority, self.shared.eps, self.shared.alpha);
            inner.sum_tree.set(slot, rho);
            inner.min_tree.set(slot, rho);
        }
        if max_observed > inner.max_priority {
            inner.max_priority = max_observed;
        }
        drop(inner);
        self.shared.metrics.record_insert(count as u64);
        tracing::trace!(count, "prioritized buffer extend_with_priorities");
        Ok(slots)
    }

    /// Fetch the raw payload at `index`, without its weight.
    pub fn get(&self, index: usize) -> Result<T> {
        self.shared.inner.lock().ring.get(index).cloned()
    }

    /// Fetch the payload at `index` together with its current
    /// importance-sampling weight. Fails with
    /// [`ReplayError::InvalidState`] if the min-tree's minimum is not
    /// strictly positive.
    pub fn get_weighted(&self, index: usize) -> Result<(T, f64)> {
        let inner = self.shared.inner.lock();
        let min_priority = inner.min_tree.min();
        if min_priority <= 0.0 {
            return Err(ReplayError::invalid_state(
                "cannot compute importance weight with non-positive minimum priority",
            ));
        }
        let payload = inner.ring.get(index).cloned()?;
        let weight = (inner.sum_tree.get(index) / min_priority).powf(-self.shared.beta);
        Ok((payload, weight))
    }

    /// Overwrite the priorities at `indices`. Fails with
    /// [`ReplayError::InvalidArgument`] if `indices` and `priorities`
    /// differ in length, any index is out of range, or any priority is
    /// negative.
    pub fn update_priority(&self, indices: &[usize], priorities: &[f64]) -> Result<()> {
        if indices.len() != priorities.len() {
            return Err(ReplayError::invalid_argument(
                "indices and priorities must have the same length",
            ));
        }
        if let Some(&p) = priorities.iter().find(|&&p| p < 0.0) {
            return Err(ReplayError::invalid_argument(format!(
                "priority must be non-negative, got {p}"
            )));
        }
        let mut inner = self.shared.inner.lock();
        let len = inner.ring.len();
        for &index in indices {
            if index >= len {
                return Err(ReplayError::out_of_range(index, len));
            }
        }
        for (&index, &priority) in indices.iter().zip(priorities.iter()) {
            let rho = Self::transform(priority, self.shared.eps, self.shared.alpha);
            inner.sum_tree.set(index, rho);
            inner.min_tree.set(index, rho);
            if priority > inner.max_priority {
                inner.max_priority = priority;
            }
        }
        drop(inner);
        self.shared.metrics.record_priority_update();
        Ok(())
    }

    /// Draw `k` slots with probability proportional to each slot's
    /// transformed priority, gather and collate their payloads, and
    /// compute importance-sampling weights. If prefetch is enabled,
    /// serves the head of the prefetch queue (or samples inline on a
    /// miss) and refills the queue before returning.
    pub fn sample(&self, k: usize) -> Result<PrioritizedSample<B>> {
        match &self.prefetch {
            None => {
                let result = Self::sample_inline(&self.shared, k);
                self.shared.metrics.record_sample(false);
                result
            }
            Some(prefetch) => self.sample_with_prefetch(prefetch, k),
        }
    }

    fn sample_with_prefetch(
        &self,
        prefetch: &Prefetch<Result<PrioritizedSample<B>>>,
        k: usize,
    ) -> Result<PrioritizedSample<B>> {
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

    fn sample_inline(shared: &Arc<Shared<T, C>>, k: usize) -> Result<PrioritizedSample<B>> {
        let (indices, weights, items) = {
            let inner = shared.inner.lock();
            let len = inner.ring.len();
            if len == 0 {
                return Err(ReplayError::invalid_state("cannot sample from an empty buffer"));
            }
            let total = inner.sum_tree.total();
            if total <= 0.0 {
                return Err(ReplayError::invalid_state(
                    "cannot sample from a sum tree with non-positive total",
                ));
            }
            let min_priority = inner.min_tree.min();
            let masses: Vec<f64> = {
                let mut rng = rand::thread_rng();
                (0..k).map(|_| rng.gen_range(0.0..total)).collect()
            };
            // Padding leaves in [capacity, next_pow2) and not-yet-written
            // slots in [len, capacity) carry zero mass, so a scan should
            // never land there; clamp defensively against float rounding
            // at the boundary.
            let indices: Vec<usize> = inner
                .sum_tree
                .scan_lower_bound_many(&masses)?
                .into_iter()
                .map(|i| i.min(len - 1))
                .collect();
            let weights: Vec<f64> = indices
                .iter()
                .map(|&i| (inner.sum_tree.get(i) / min_priority).powf(-shared.beta))
                .collect();
            let items = indices
                .iter()
                .map(|&i| inner.ring.get(i).cloned())
                .collect::<Result<Vec<_>>>()?;
            (indices, weights, items)
        };
        let batch = shared.collate.collate(items)?;
        let batch = crate::device::maybe_pin(batch, shared.pin_memory)?;
        let weights = crate::device::maybe_pin(weights, shared.pin_memory)?;
        Ok(PrioritizedSample { batch, indices, weights })
    }

    fn transform(priority: f64, eps: f64, alpha: f64) -> f64 {
        (priority + eps).powf(alpha)
    }
}
