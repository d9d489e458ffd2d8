//! Platform bring-up
//!
//! Wires heap, pool allocator, virtual NVRAM and host link together from one
//! [`PlatformConfig`]. Nothing is returned unless every step succeeded.

use crate::config::PlatformConfig;
use crate::error::Result;
use crate::nvram::VirtualNvram;
use crate::pool::{HeapArena, PoolAllocator};
use crate::transport::{HostLink, HostTransport};
use std::sync::Arc;
use tracing::info;

/// Build the receive side of the platform
pub fn bring_up(config: &PlatformConfig, transport: Box<dyn HostTransport>) -> Result<HostLink> {
    config.validate()?;

    let heap = HeapArena::new(config.heap.name.as_str(), config.heap.size);
    let pool = Arc::new(PoolAllocator::initialize(&config.pool.classes, &heap)?);

    info!(
        heap = %heap.name(),
        capacity = heap.capacity(),
        remaining = heap.remaining(),
        "Platform memory ready"
    );

    let store = VirtualNvram::new(pool, transport);
    Ok(HostLink::new(store, config.transport))
}
