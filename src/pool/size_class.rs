//! Size class management for the pool allocator

use super::block::BLOCK_HEADER_SIZE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration of one size class: `block_count` blocks of `block_size` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolClass {
    pub block_size: usize,
    pub block_count: usize,
}

impl PoolClass {
    pub const fn new(block_size: usize, block_count: usize) -> Self {
        Self {
            block_size,
            block_count,
        }
    }

    /// Bytes one block of this class takes in the arena, header included
    pub const fn stride(&self) -> usize {
        BLOCK_HEADER_SIZE + self.block_size
    }

    /// Bytes the whole class takes in the arena
    pub const fn span(&self) -> usize {
        self.stride() * self.block_count
    }
}

/// Check that a class table can back an arena.
///
/// Block sizes must be strictly ascending, and every class must hold at
/// least one non-empty block.
pub fn validate_classes(classes: &[PoolClass]) -> Result<()> {
    if classes.is_empty() {
        return Err(Error::InitializationFailure(
            "pool needs at least one size class".to_string(),
        ));
    }

    for (index, class) in classes.iter().enumerate() {
        if class.block_size == 0 || class.block_count == 0 {
            return Err(Error::InitializationFailure(format!(
                "size class {} is empty ({} x {} bytes)",
                index, class.block_count, class.block_size
            )));
        }
    }

    for (index, pair) in classes.windows(2).enumerate() {
        if pair[1].block_size <= pair[0].block_size {
            return Err(Error::InitializationFailure(format!(
                "size class {} ({} bytes) must be larger than class {} ({} bytes)",
                index + 1,
                pair[1].block_size,
                index,
                pair[0].block_size
            )));
        }
    }

    Ok(())
}

/// Runtime state of a size class inside an initialized arena
///
/// Free blocks are threaded through their headers; `free_head` is the
/// class-local index of the first one.
#[derive(Debug)]
pub(crate) struct SizeClass {
    /// Index of this size class
    pub index: u16,
    /// Payload size of blocks in this class (bytes)
    pub block_size: usize,
    /// Number of blocks in this class
    pub block_count: usize,
    /// Arena offset of the first block header
    pub base_offset: usize,
    /// Use-map bit of the first block
    pub first_bit: usize,
    /// Head of the free list
    pub free_head: Option<u32>,
    /// Number of blocks on the free list
    pub free_count: usize,
}

impl SizeClass {
    pub fn new(index: u16, config: PoolClass, base_offset: usize, first_bit: usize) -> Self {
        Self {
            index,
            block_size: config.block_size,
            block_count: config.block_count,
            base_offset,
            first_bit,
            free_head: None,
            free_count: 0,
        }
    }

    pub fn stride(&self) -> usize {
        BLOCK_HEADER_SIZE + self.block_size
    }

    pub fn end_offset(&self) -> usize {
        self.base_offset + self.stride() * self.block_count
    }

    /// Whether an arena offset falls inside this class's byte range
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.base_offset && offset < self.end_offset()
    }

    /// Check if a given size fits in this size class
    pub fn can_fit(&self, size: usize) -> bool {
        size <= self.block_size
    }

    /// Arena offset of the header of a class-local block
    pub fn header_offset(&self, local: u32) -> usize {
        self.base_offset + local as usize * self.stride()
    }

    /// Arena offset of the payload of a class-local block
    pub fn payload_offset(&self, local: u32) -> usize {
        self.header_offset(local) + BLOCK_HEADER_SIZE
    }

    /// Map a payload offset back to its class-local block index.
    ///
    /// Returns `None` unless the offset sits exactly at a payload start.
    pub fn local_index(&self, offset: usize) -> Option<u32> {
        if !self.contains(offset) {
            return None;
        }
        let relative = offset - self.base_offset;
        if relative % self.stride() != BLOCK_HEADER_SIZE {
            return None;
        }
        u32::try_from(relative / self.stride()).ok()
    }

    pub fn allocated_count(&self) -> usize {
        self.block_count - self.free_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_board_table() {
        let classes = [
            PoolClass::new(32, 2),
            PoolClass::new(80, 2),
            PoolClass::new(284, 2),
            PoolClass::new(572, 1),
        ];
        assert!(validate_classes(&classes).is_ok());
    }

    #[test]
    fn test_validate_rejects_unordered() {
        let equal = [PoolClass::new(32, 1), PoolClass::new(32, 1)];
        assert!(matches!(
            validate_classes(&equal),
            Err(Error::InitializationFailure(_))
        ));

        let descending = [PoolClass::new(64, 1), PoolClass::new(32, 1)];
        assert!(validate_classes(&descending).is_err());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(validate_classes(&[]).is_err());
        assert!(validate_classes(&[PoolClass::new(0, 1)]).is_err());
        assert!(validate_classes(&[PoolClass::new(16, 0)]).is_err());
    }

    #[test]
    fn test_local_index() {
        let sc = SizeClass::new(1, PoolClass::new(12, 3), 100, 4);
        assert_eq!(sc.stride(), 16);
        assert_eq!(sc.end_offset(), 148);

        assert_eq!(sc.local_index(104), Some(0));
        assert_eq!(sc.local_index(120), Some(1));
        assert_eq!(sc.local_index(136), Some(2));

        // Header bytes and mid-payload bytes are not block addresses
        assert_eq!(sc.local_index(100), None);
        assert_eq!(sc.local_index(105), None);
        // Outside the class
        assert_eq!(sc.local_index(152), None);
        assert_eq!(sc.local_index(4), None);
    }

    #[test]
    fn test_can_fit() {
        let sc = SizeClass::new(0, PoolClass::new(128, 1), 0, 0);

        assert!(sc.can_fit(64));
        assert!(sc.can_fit(128));
        assert!(!sc.can_fit(129));
        assert!(!sc.can_fit(256));
    }
}
