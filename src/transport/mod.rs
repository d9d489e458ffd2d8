//! Host transport
//!
//! The virtual NVRAM lives on the device, but its contents belong to the
//! host: every inbound push arrives over the host link, and every local
//! mutation is mirrored back out.
//!
//! ```text
//! host ──frame──→ HostLink ──push NVRAM──→ VirtualNvram ──→ PoolAllocator
//!                    │                          │
//!                    └──other opcodes──→ app    └──notify──→ HostTransport ──→ host
//! ```
//!
//! Outbound notifications are best effort. A transport that fails to deliver
//! one reports the error, and the store logs and drops it.

pub mod codec;
pub mod dispatcher;
pub mod link;
pub mod mock;

use crate::error::Result;
use serde::Serialize;

pub use codec::Frame;
pub use dispatcher::{AppHandler, Dispatch, HostLink};
pub use link::WriterTransport;
pub use mock::RecordingTransport;

/// Receiver of outbound NVRAM mutation notifications
pub trait HostTransport: Send + Sync {
    /// A record was created or its contents changed
    fn notify_write(&self, key: u16, payload: &[u8]) -> Result<()>;

    /// A record was removed
    fn notify_delete(&self, key: u16) -> Result<()>;
}

/// An outbound notification, as captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Write { key: u16, payload: Vec<u8> },
    Delete { key: u16 },
}
