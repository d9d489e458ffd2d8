//! Block addressing for the pool allocator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes reserved in front of every block payload for the free-list link
pub const BLOCK_HEADER_SIZE: usize = 4;

/// Link value terminating a free list
pub const NULL_LINK: u32 = u32::MAX;

/// Handle to an allocated block
///
/// The offset is the byte position of the payload inside the arena, so a
/// handle behaves like the payload pointer of a C pool: it can be handed back
/// to [`PoolAllocator::free`](super::PoolAllocator::free), which re-derives
/// the owning class from the offset alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[must_use]
pub struct BlockHandle {
    /// Size class index (0 = smallest)
    pub(crate) class: u16,
    /// Payload offset within the arena
    pub(crate) offset: u32,
}

impl BlockHandle {
    pub(crate) fn new(class: u16, offset: u32) -> Self {
        Self { class, offset }
    }

    /// Size class this block was served from
    pub fn class(&self) -> u16 {
        self.class
    }

    /// Payload offset within the arena
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block(class={}, offset={})", self.class, self.offset)
    }
}

/// Read the next-free link stored in a block header
pub(crate) fn read_link(header: &[u8]) -> Option<u32> {
    let link = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    (link != NULL_LINK).then_some(link)
}

/// Store a next-free link into a block header
pub(crate) fn write_link(header: &mut [u8], next: Option<u32>) {
    let link = next.unwrap_or(NULL_LINK);
    header[..BLOCK_HEADER_SIZE].copy_from_slice(&link.to_le_bytes());
}
