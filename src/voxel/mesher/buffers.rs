//! Fixed-capacity output arenas filled concurrently by the mesher

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pre-sized arena whose slots are claimed with an atomic running counter.
///
/// Each claimed slot is written exactly once by the worker that claimed it, so
/// no compaction pass is needed afterwards. Claims past the capacity fail but
/// still advance the counter, which is how overflow is detected.
pub struct SlotBuffer<T> {
    slots: Box<[OnceLock<T>]>,
    claimed: AtomicUsize,
}

impl<T> SlotBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            claimed: AtomicUsize::new(0),
        }
    }

    /// Claim one slot, `None` once the arena is full
    pub fn claim(&self) -> Option<usize> {
        let slot = self.claimed.fetch_add(1, Ordering::Relaxed);
        (slot < self.slots.len()).then_some(slot)
    }

    /// Fill a claimed slot. Returns false if the slot is out of range or already written.
    pub fn write(&self, slot: usize, value: T) -> bool {
        self.slots.get(slot).is_some_and(|s| s.set(value).is_ok())
    }

    /// Slots requested so far, including failed claims
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn overflowed(&self) -> bool {
        self.claimed() > self.slots.len()
    }

    /// Written slots in claim order. `None` on overflow or if a claimed slot was never written.
    pub fn into_vec(self) -> Option<Vec<T>> {
        if self.overflowed() {
            return None;
        }
        let count = self.claimed.into_inner();
        self.slots
            .into_vec()
            .into_iter()
            .take(count)
            .map(OnceLock::into_inner)
            .collect()
    }
}
