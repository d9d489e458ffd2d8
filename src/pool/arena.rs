//! Arena sources
//!
//! The pool allocator never allocates on its own. It asks an [`ArenaSource`]
//! for its backing buffers once, at initialization, and keeps them for the
//! rest of its life.

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Supplier of long-lived raw buffers
pub trait ArenaSource: Send + Sync {
    /// Hand out a zeroed buffer of exactly `size` bytes, or `None` if the
    /// source cannot satisfy the request. There is no release operation.
    fn acquire_buffer(&self, size: usize) -> Option<Box<[u8]>>;
}

/// Bounded heap that hands out buffers until its budget is spent
///
/// Mirrors the fixed platform heap a board carves out at boot: every grant is
/// permanent, so the budget only ever shrinks.
#[derive(Debug)]
pub struct HeapArena {
    name: String,
    capacity: usize,
    used: Mutex<usize>,
}

impl HeapArena {
    /// Create a heap with a total budget of `capacity` bytes
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            used: Mutex::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.capacity - *self.used.lock()
    }
}

impl ArenaSource for HeapArena {
    fn acquire_buffer(&self, size: usize) -> Option<Box<[u8]>> {
        let mut used = self.used.lock();
        let remaining = self.capacity - *used;
        if size > remaining {
            warn!(
                heap = %self.name,
                requested = size,
                remaining,
                "Heap exhausted"
            );
            return None;
        }

        *used += size;
        debug!(heap = %self.name, size, used = *used, "Granted heap buffer");
        Some(vec![0u8; size].into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_budget() {
        let heap = HeapArena::new("test_heap", 100);

        let first = heap.acquire_buffer(60).expect("fits in budget");
        assert_eq!(first.len(), 60);
        assert!(first.iter().all(|&b| b == 0));
        assert_eq!(heap.remaining(), 40);

        assert!(heap.acquire_buffer(41).is_none());
        assert_eq!(heap.remaining(), 40);

        assert!(heap.acquire_buffer(40).is_some());
        assert_eq!(heap.remaining(), 0);
    }
}
