//! Bounded work-ahead pipeline that overlaps sampling with consumer
//! work.
//!
//! Grounded in two teacher idioms: `flux::disruptor::wait_strategy`'s
//! `BlockingWaitStrategy`, which pairs a `parking_lot::Mutex` with a
//! `parking_lot::Condvar` to park a thread until a condition holds, and
//! the worker-pool-of-OS-threads style the teacher uses throughout
//! (rather than pulling in an async runtime for what is fundamentally a
//! handful of blocking background workers).

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of OS threads draining a bounded job queue.
///
/// Dropping the pool closes the job channel and joins every worker,
/// satisfying the pipeline's shutdown contract: outstanding tasks are
/// drained and no worker thread outlives the pool.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `workers` threads pulling jobs from a shared bounded
    /// channel.
    pub fn new(workers: usize) -> Self {
        Self::with_worker_count(workers)
    }

    /// Size a pool for a prefetch queue of the given capacity: one
    /// worker per pending slot, capped at the number of available CPUs
    /// so a large `prefetch_cap` doesn't oversubscribe the machine with
    /// idle background threads.
    pub fn for_prefetch(prefetch_cap: usize) -> Self {
        let workers = prefetch_cap.min(num_cpus::get()).max(1);
        Self::with_worker_count(workers)
    }

    fn with_worker_count(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = bounded(workers * 4);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let receiver = receiver.clone();
            handles.push(std::thread::spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            }));
        }
        Self { sender: Some(sender), workers: handles }
    }

    /// Submit a job for background execution. Silently dropped if the
    /// pool has already been shut down (never happens while the owning
    /// buffer is alive).
    pub fn submit(&self, job: Job) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// A handle to a single in-flight or completed background sample task.
///
/// Backed by a mutex-guarded result slot and a condvar, the same
/// primitive `BlockingWaitStrategy` uses to park a consumer until data
/// is available.
pub struct SampleFuture<R> {
    state: Arc<(Mutex<Option<R>>, Condvar)>,
}

impl<R: Send + 'static> SampleFuture<R> {
    /// Submit `task` to `pool` and return a handle to its eventual
    /// result.
    pub fn spawn(pool: &ThreadPool, task: impl FnOnce() -> R + Send + 'static) -> Self {
        let state = Arc::new((Mutex::new(None), Condvar::new()));
        let producer_state = Arc::clone(&state);
        pool.submit(Box::new(move || {
            let result = task();
            let (lock, condvar) = &*producer_state;
            let mut guard = lock.lock();
            *guard = Some(result);
            condvar.notify_one();
        }));
        Self { state }
    }

    /// Block until the task completes and return its result.
    pub fn wait(self) -> R {
        let (lock, condvar) = &*self.state;
        let mut guard = lock.lock();
        while guard.is_none() {
            condvar.wait(&mut guard);
        }
        guard.take().expect("condvar woke with no result")
    }
}

/// Bounded FIFO queue of pending sample futures, the state guarded by
/// the buffer's future lock.
pub struct PrefetchQueue<R> {
    capacity: usize,
    pending: std::collections::VecDeque<SampleFuture<R>>,
}

impl<R: Send + 'static> PrefetchQueue<R> {
    /// Create an empty queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, pending: std::collections::VecDeque::with_capacity(capacity) }
    }

    /// Pop the oldest pending future, if any.
    pub fn pop(&mut self) -> Option<SampleFuture<R>> {
        self.pending.pop_front()
    }

    /// Number of futures currently pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue currently holds no pending futures.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The configured maximum number of pending futures.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submit one more task to `pool` and push its handle onto the
    /// back of the queue.
    pub fn push_spawn(&mut self, pool: &ThreadPool, task: impl FnOnce() -> R + Send + 'static) {
        self.pending.push_back(SampleFuture::spawn(pool, task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn future_delivers_result() {
        let pool = ThreadPool::new(2);
        let fut = SampleFuture::spawn(&pool, || 42);
        assert_eq!(fut.wait(), 42);
    }

    #[test]
    fn queue_refills_up_to_capacity() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut queue: PrefetchQueue<usize> = PrefetchQueue::new(3);
        while queue.len() < queue.capacity() {
            let counter = Arc::clone(&counter);
            queue.push_spawn(&pool, move || counter.fetch_add(1, Ordering::SeqCst));
        }
        assert_eq!(queue.len(), 3);
        let first = queue.pop().unwrap();
        first.wait();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn pool_joins_workers_on_drop() {
        let pool = ThreadPool::new(4);
        drop(pool);
    }

    #[test]
    fn for_prefetch_caps_workers_at_available_cpus() {
        let pool = ThreadPool::for_prefetch(usize::MAX / 2);
        assert!(pool.workers.len() <= num_cpus::get());
        assert!(!pool.workers.is_empty());
    }
}
