//! Pool Allocator
//!
//! Serves every dynamic allocation of the platform from a single arena
//! acquired once at boot. The arena is carved into fixed-size classes, each a
//! run of equally sized blocks.
//!
//! # Architecture
//!
//! ```text
//! PoolAllocator (one lock)
//!   ├─→ SizeClass(32B  x2)  → Free: 0 → 1 → null
//!   ├─→ SizeClass(80B  x2)  → Free: 1 → null
//!   ├─→ SizeClass(284B x2)  → Free: null
//!   └─→ SizeClass(572B x1)  → Free: 0 → null
//!
//! Arena:   [hdr|32B][hdr|32B][hdr|80B][hdr|80B][hdr|284B]...
//! Use map: one bit per block, set while allocated
//! ```
//!
//! Each block header stores the class-local index of the next free block.
//! Blocks are never split, merged or borrowed across classes.

pub mod allocator;
pub mod arena;
pub mod block;
pub mod size_class;
mod use_map;

pub use allocator::{PoolAllocator, PoolStats, SizeClassStats, PLATFORM_HEAP_NAME};
pub use arena::{ArenaSource, HeapArena};
pub use block::{BlockHandle, BLOCK_HEADER_SIZE};
pub use size_class::{validate_classes, PoolClass};
