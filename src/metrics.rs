//! Lightweight, lock-free observability counters.
//!
//! Mirrors the shape of `flux::performance::PerformanceMonitor`: plain
//! atomic counters updated on the hot path, snapshotted into a plain
//! struct on demand. Metrics are ambient — they exist regardless of
//! which Non-goals the buffer variant in use has opted out of.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of buffer activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total payloads written via `add`/`extend`.
    pub inserts: u64,
    /// Total `sample` calls completed (inline or via prefetch).
    pub samples: u64,
    /// `sample` calls that were served from the prefetch queue.
    pub prefetch_hits: u64,
    /// `sample` calls that had to sample inline because the prefetch
    /// queue was empty.
    pub prefetch_misses: u64,
    /// Total `update_priority` calls completed.
    pub priority_updates: u64,
}

/// Atomic counters backing a [`MetricsSnapshot`].
#[derive(Debug, Default)]
pub struct ReplayMetrics {
    inserts: AtomicU64,
    samples: AtomicU64,
    prefetch_hits: AtomicU64,
    prefetch_misses: AtomicU64,
    priority_updates: AtomicU64,
}

impl ReplayMetrics {
    /// Create a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self, count: u64) {
        self.inserts.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_sample(&self, from_prefetch: bool) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if from_prefetch {
            self.prefetch_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.prefetch_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_priority_update(&self) {
        self.priority_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of the current counters.
    /// Individual fields are read independently with `Relaxed`
    /// ordering, so the snapshot may interleave with concurrent
    /// updates — acceptable for observability, not used for control
    /// flow.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            prefetch_hits: self.prefetch_hits.load(Ordering::Relaxed),
            prefetch_misses: self.prefetch_misses.load(Ordering::Relaxed),
            priority_updates: self.priority_updates.load(Ordering::Relaxed),
        }
    }
}
