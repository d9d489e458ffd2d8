//! Pool allocator implementation

use super::arena::{ArenaSource, HeapArena};
use super::block::{read_link, write_link, BlockHandle, BLOCK_HEADER_SIZE};
use super::size_class::{validate_classes, PoolClass, SizeClass};
use super::use_map::UseMap;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

/// Name given to heaps created by [`PoolAllocator::with_heap`]
pub const PLATFORM_HEAP_NAME: &str = "platform_heap";

/// Fixed-size-class pool allocator
///
/// Serves every allocation from one arena acquired at initialization. Each
/// size class owns a run of equally sized blocks; free blocks of a class are
/// chained through their headers and reused last-in, first-out.
///
/// All state sits behind a single non-reentrant lock, held for the whole of
/// each call.
#[derive(Debug)]
pub struct PoolAllocator {
    state: Mutex<PoolState>,
}

#[derive(Debug)]
struct PoolState {
    /// Size classes (sorted by size)
    classes: Vec<SizeClass>,
    /// Block headers and payloads of every class, back to back
    arena: Box<[u8]>,
    use_map: UseMap,
}

impl PoolState {
    /// Find the class and class-local index of the block whose payload starts
    /// at `offset`, scanning class ranges in ascending order.
    fn locate(&self, offset: usize) -> Option<(usize, u32)> {
        let position = self.classes.iter().position(|sc| sc.contains(offset))?;
        let local = self.classes[position].local_index(offset)?;
        Some((position, local))
    }

    fn is_allocated(&self, position: usize, local: u32) -> bool {
        self.use_map
            .is_set(self.classes[position].first_bit + local as usize)
    }

    /// Resolve a handle that must point at a live block
    fn resolve(&self, handle: BlockHandle) -> Result<(usize, u32)> {
        match self.locate(handle.offset as usize) {
            Some((position, local)) if self.is_allocated(position, local) => {
                Ok((position, local))
            }
            _ => Err(Error::InvalidArgument(format!(
                "{} is not an allocated block",
                handle
            ))),
        }
    }

    fn payload_range(&self, position: usize, local: u32, len: usize) -> Range<usize> {
        let start = self.classes[position].payload_offset(local);
        start..start + len
    }
}

impl PoolAllocator {
    /// Initialize a pool over buffers taken from `source`
    ///
    /// Validates the class table, then acquires the use map and the arena
    /// from the source and threads every class's blocks into its free list.
    /// On any failure nothing is returned, so no partially built pool can be
    /// used.
    pub fn initialize(classes: &[PoolClass], source: &dyn ArenaSource) -> Result<Self> {
        validate_classes(classes)?;

        if classes.len() > usize::from(u16::MAX) + 1 {
            return Err(Error::InitializationFailure(format!(
                "too many size classes: {}",
                classes.len()
            )));
        }

        let total_blocks: usize = classes.iter().map(|c| c.block_count).sum();
        let arena_bytes = classes
            .iter()
            .try_fold(0usize, |acc, c| {
                c.block_count
                    .checked_mul(c.stride())
                    .and_then(|span| acc.checked_add(span))
            })
            .filter(|&total| u32::try_from(total).is_ok())
            .ok_or_else(|| {
                Error::InitializationFailure("arena does not fit a 32-bit offset".to_string())
            })?;
        let use_map_bytes = UseMap::bytes_for(total_blocks);

        let use_map = acquire(source, use_map_bytes, "use map")?;
        let mut arena = acquire(source, arena_bytes, "arena")?;
        arena.fill(0);

        let mut size_classes = Vec::with_capacity(classes.len());
        let mut base_offset = 0;
        let mut first_bit = 0;

        for (index, &config) in classes.iter().enumerate() {
            let mut sc = SizeClass::new(index as u16, config, base_offset, first_bit);

            for local in 0..config.block_count as u32 {
                let next = (local as usize + 1 < config.block_count).then_some(local + 1);
                let header = sc.header_offset(local);
                write_link(&mut arena[header..header + BLOCK_HEADER_SIZE], next);
            }
            sc.free_head = Some(0);
            sc.free_count = config.block_count;

            base_offset = sc.end_offset();
            first_bit += config.block_count;
            size_classes.push(sc);
        }

        info!(
            classes = size_classes.len(),
            blocks = total_blocks,
            arena_bytes,
            use_map_bytes,
            "Initialized pool allocator"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                classes: size_classes,
                arena,
                use_map: UseMap::from_buffer(use_map),
            }),
        })
    }

    /// Initialize a pool over a fresh bounded heap of `heap_size` bytes
    pub fn with_heap(classes: &[PoolClass], heap_size: usize) -> Result<Self> {
        let heap = HeapArena::new(PLATFORM_HEAP_NAME, heap_size);
        Self::initialize(classes, &heap)
    }

    /// Allocate a block of at least `size` bytes
    ///
    /// Takes the first class, in ascending order, that is large enough and
    /// still has a free block. Blocks are never split or borrowed across
    /// classes. The payload is zero-filled.
    pub fn allocate(&self, size: usize) -> Result<BlockHandle> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(class) = state
            .classes
            .iter_mut()
            .find(|sc| sc.can_fit(size) && sc.free_count > 0)
        else {
            debug!(size, "No free block large enough");
            return Err(Error::NoMemory(size));
        };

        let Some(local) = class.free_head else {
            warn!(class = class.index, "Free list empty with blocks outstanding");
            return Err(Error::NoMemory(size));
        };

        let header = class.header_offset(local);
        class.free_head = read_link(&state.arena[header..header + BLOCK_HEADER_SIZE]);
        class.free_count -= 1;
        state.use_map.set(class.first_bit + local as usize);

        let payload = header + BLOCK_HEADER_SIZE;
        state.arena[payload..payload + class.block_size].fill(0);

        let handle = BlockHandle::new(class.index, payload as u32);
        debug!(size, %handle, "Allocated block");
        Ok(handle)
    }

    /// Return a block to its class free list
    ///
    /// Handles that do not point exactly at a block payload, and blocks that
    /// are not currently allocated, are ignored.
    pub fn free(&self, handle: BlockHandle) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some((position, local)) = state.locate(handle.offset as usize) else {
            warn!(%handle, "Ignoring free of foreign or misaligned block");
            return;
        };

        if !state.is_allocated(position, local) {
            warn!(%handle, "Ignoring free of unallocated block");
            return;
        }

        let class = &mut state.classes[position];
        state.use_map.clear(class.first_bit + local as usize);

        let header = class.header_offset(local);
        write_link(
            &mut state.arena[header..header + BLOCK_HEADER_SIZE],
            class.free_head,
        );
        class.free_head = Some(local);
        class.free_count += 1;

        debug!(%handle, "Freed block");
    }

    /// Payload capacity of an allocated block
    pub fn block_capacity(&self, handle: BlockHandle) -> Result<usize> {
        let state = self.state.lock();
        let (position, _) = state.resolve(handle)?;
        Ok(state.classes[position].block_size)
    }

    /// Copy `data` into the start of an allocated block
    pub fn write_payload(&self, handle: BlockHandle, data: &[u8]) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let (position, local) = state.resolve(handle)?;
        let capacity = state.classes[position].block_size;
        if data.len() > capacity {
            return Err(Error::TooSmall {
                required: data.len(),
                capacity,
            });
        }

        let range = state.payload_range(position, local, data.len());
        state.arena[range].copy_from_slice(data);
        Ok(())
    }

    /// Fill `dest` from the start of an allocated block
    pub fn read_payload(&self, handle: BlockHandle, dest: &mut [u8]) -> Result<()> {
        let state = self.state.lock();

        let (position, local) = state.resolve(handle)?;
        let capacity = state.classes[position].block_size;
        if dest.len() > capacity {
            return Err(Error::InvalidArgument(format!(
                "read of {} bytes exceeds {} byte block",
                dest.len(),
                capacity
            )));
        }

        let range = state.payload_range(position, local, dest.len());
        dest.copy_from_slice(&state.arena[range]);
        Ok(())
    }

    /// Whether the block payload starts with exactly `data`
    pub fn payload_matches(&self, handle: BlockHandle, data: &[u8]) -> bool {
        let state = self.state.lock();

        match state.resolve(handle) {
            Ok((position, local)) if data.len() <= state.classes[position].block_size => {
                let range = state.payload_range(position, local, data.len());
                state.arena[range] == *data
            }
            _ => false,
        }
    }

    /// Class table the pool was built from
    pub fn classes(&self) -> Vec<PoolClass> {
        self.state
            .lock()
            .classes
            .iter()
            .map(|sc| PoolClass::new(sc.block_size, sc.block_count))
            .collect()
    }

    /// Largest request the pool can ever satisfy
    pub fn max_block_size(&self) -> usize {
        self.state
            .lock()
            .classes
            .last()
            .map_or(0, |sc| sc.block_size)
    }

    /// Get statistics about the allocator
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();

        PoolStats {
            size_classes: state
                .classes
                .iter()
                .map(|sc| SizeClassStats {
                    index: sc.index,
                    block_size: sc.block_size,
                    block_count: sc.block_count,
                    free_blocks: sc.free_count,
                    allocated_blocks: sc.allocated_count(),
                })
                .collect(),
            arena_bytes: state.arena.len(),
            use_map_bytes: state.use_map.len_bytes(),
        }
    }
}

fn acquire(source: &dyn ArenaSource, size: usize, what: &str) -> Result<Box<[u8]>> {
    let buffer = source.acquire_buffer(size).ok_or_else(|| {
        Error::InitializationFailure(format!("failed to acquire {} bytes for {}", size, what))
    })?;

    if buffer.len() != size {
        return Err(Error::InitializationFailure(format!(
            "arena source returned {} bytes for {}, expected {}",
            buffer.len(),
            what,
            size
        )));
    }

    Ok(buffer)
}

/// Statistics for the pool allocator
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub size_classes: Vec<SizeClassStats>,
    pub arena_bytes: usize,
    pub use_map_bytes: usize,
}

impl PoolStats {
    /// Blocks currently handed out, across all classes
    pub fn allocated_blocks(&self) -> usize {
        self.size_classes.iter().map(|c| c.allocated_blocks).sum()
    }

    /// Blocks currently on free lists, across all classes
    pub fn free_blocks(&self) -> usize {
        self.size_classes.iter().map(|c| c.free_blocks).sum()
    }

    /// Payload bytes of all allocated blocks
    pub fn allocated_bytes(&self) -> usize {
        self.size_classes
            .iter()
            .map(|c| c.allocated_blocks * c.block_size)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SizeClassStats {
    pub index: u16,
    pub block_size: usize,
    pub block_count: usize,
    pub free_blocks: usize,
    pub allocated_blocks: usize,
}
