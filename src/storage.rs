//! Fixed-capacity circular storage for opaque payloads.
//!
//! `StorageRing` is the content-agnostic core every buffer variant is
//! built on: it knows nothing about priorities or sampling, only about
//! where the next write lands and which slots are currently occupied.

use crate::error::{ReplayError, Result};

/// Fixed-capacity circular vector of payloads with a write cursor and
/// logical length.
///
/// Invariant: after any operation, `cursor == number_of_writes mod
/// capacity` and `len() == min(number_of_writes, capacity)`.
#[derive(Debug)]
pub struct StorageRing<T> {
    capacity: usize,
    storage: Vec<T>,
    cursor: usize,
}

impl<T> StorageRing<T> {
    /// Create an empty ring with the given capacity. `capacity` must be
    /// greater than zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "storage ring capacity must be > 0");
        Self {
            capacity,
            storage: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Fixed maximum number of payloads retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current occupancy, `<= capacity`.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the ring currently holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Next write position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Borrow the payload at `index`. `index` must be `< len()`.
    pub fn get(&self, index: usize) -> Result<&T> {
        self.storage
            .get(index)
            .ok_or_else(|| ReplayError::out_of_range(index, self.len()))
    }

    /// Place `payload` at the cursor, growing the backing vector while
    /// `len() < capacity`, otherwise overwriting. Returns the slot the
    /// payload was written to and advances the cursor modulo capacity.
    pub fn add(&mut self, payload: T) -> usize {
        let slot = self.cursor;
        if slot >= self.storage.len() {
            self.storage.push(payload);
        } else {
            self.storage[slot] = payload;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
        slot
    }

    /// Write a batch of payloads starting at the cursor, wrapping if
    /// necessary, and return the slots written to in write order.
    ///
    /// Fails with [`ReplayError::InvalidArgument`] if `payloads` is
    /// empty or longer than `capacity` — per the open question in the
    /// design notes, a batch larger than capacity makes per-element
    /// priority alignment ambiguous, so it is rejected outright rather
    /// than silently keeping only the tail.
    pub fn extend(&mut self, payloads: Vec<T>) -> Result<Vec<usize>> {
        let batch_size = payloads.len();
        if batch_size == 0 {
            return Err(ReplayError::invalid_argument("extend requires a non-empty batch"));
        }
        if batch_size > self.capacity {
            return Err(ReplayError::invalid_argument(format!(
                "batch of {batch_size} exceeds capacity {}",
                self.capacity
            )));
        }

        let cur_size = self.storage.len();
        let mut indices = Vec::with_capacity(batch_size);
        let mut iter = payloads.into_iter();

        if cur_size + batch_size <= self.capacity {
            // Fits without wrap.
            for offset in 0..batch_size {
                self.storage.push(iter.next().unwrap());
                indices.push(cur_size + offset);
            }
            self.cursor = (self.cursor + batch_size) % self.capacity;
        } else if cur_size < self.capacity {
            // Fills remaining capacity then overwrites from slot 0.
            let fill = self.capacity - cur_size;
            for offset in 0..fill {
                self.storage.push(iter.next().unwrap());
                indices.push(cur_size + offset);
            }
            for offset in 0..(batch_size - fill) {
                self.storage[offset] = iter.next().unwrap();
                indices.push(offset);
            }
            self.cursor = batch_size - fill;
        } else if self.cursor + batch_size <= self.capacity {
            // Already full, fits without wrap from the current cursor.
            for offset in 0..batch_size {
                self.storage[self.cursor + offset] = iter.next().unwrap();
                indices.push(self.cursor + offset);
            }
            self.cursor = (self.cursor + batch_size) % self.capacity;
        } else {
            // Already full, wraps: split at capacity - cursor.
            let d = self.capacity - self.cursor;
            for offset in 0..d {
                self.storage[self.cursor + offset] = iter.next().unwrap();
                indices.push(self.cursor + offset);
            }
            for offset in 0..(batch_size - d) {
                self.storage[offset] = iter.next().unwrap();
                indices.push(offset);
            }
            self.cursor = batch_size - d;
        }

        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overwrites_in_fifo_order() {
        let mut ring = StorageRing::new(4);
        for c in ['A', 'B', 'C', 'D', 'E', 'F'] {
            ring.add(c);
        }
        let contents: Vec<_> = (0..4).map(|i| *ring.get(i).unwrap()).collect();
        assert_eq!(contents, vec!['E', 'F', 'C', 'D']);
        assert_eq!(ring.cursor(), 2);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn extend_wraps_and_overwrites() {
        let mut ring = StorageRing::new(4);
        let slots = ring.extend(vec!['A', 'B', 'C', 'D', 'E']).unwrap();
        assert_eq!(slots, vec![0, 1, 2, 3, 0]);
        let contents: Vec<_> = (0..4).map(|i| *ring.get(i).unwrap()).collect();
        assert_eq!(contents, vec!['E', 'B', 'C', 'D']);
        assert_eq!(ring.cursor(), 1);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn extend_fits_without_wrap() {
        let mut ring = StorageRing::new(8);
        let slots = ring.extend(vec!['A', 'B', 'C']).unwrap();
        assert_eq!(slots, vec![0, 1, 2]);
        assert_eq!(ring.cursor(), 3);
    }

    #[test]
    fn extend_rejects_empty_batch() {
        let mut ring: StorageRing<u8> = StorageRing::new(4);
        assert!(ring.extend(Vec::new()).is_err());
    }

    #[test]
    fn extend_rejects_oversized_batch() {
        let mut ring: StorageRing<u8> = StorageRing::new(4);
        assert!(ring.extend(vec![1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn get_out_of_range_fails() {
        let ring: StorageRing<u8> = StorageRing::new(4);
        assert!(ring.get(0).is_err());
    }

    #[test]
    fn occupancy_matches_total_writes_mod_capacity() {
        let mut ring = StorageRing::new(3);
        let mut total = 0usize;
        for batch in [vec![1, 2], vec![3, 4, 5], vec![6]] {
            total += batch.len();
            ring.extend(batch).unwrap();
            assert_eq!(ring.len(), total.min(3));
            assert_eq!(ring.cursor(), total % 3);
        }
    }
}
