//! Virtual NVRAM
//!
//! The board has no writable non-volatile medium of its own. Instead the host
//! pushes its saved records down at start-up and keeps a mirror of every
//! change the device makes.
//!
//! # Architecture
//!
//! ```text
//! VirtualNvram
//!   ├─→ Catalogue (newest first)
//!   │     head → [key 0x0012, 40B] → [key 0x0003, 3B] → null
//!   │                  │                   │
//!   ├─→ PoolAllocator  └─→ Block(80B)      └─→ Block(32B)
//!   └─→ HostTransport  (write / delete notifications)
//! ```
//!
//! Lookups walk the catalogue from the head; each record owns exactly one
//! pool block.

pub mod record;
pub mod store;

pub use record::{Record, RecordId};
pub use store::{NvramStats, VirtualNvram, MAX_RECORD_LEN};
