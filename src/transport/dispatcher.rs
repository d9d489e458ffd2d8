//! Inbound frame routing

use super::codec::{decode_nvram_content, Frame};
use crate::config::TransportConfig;
use crate::error::Result;
use crate::nvram::VirtualNvram;
use tracing::{debug, trace};

/// Application callback for opcodes the platform does not consume
pub trait AppHandler: Send {
    fn handle(&mut self, opcode: u16, payload: &[u8]);
}

impl<F> AppHandler for F
where
    F: FnMut(u16, &[u8]) + Send,
{
    fn handle(&mut self, opcode: u16, payload: &[u8]) {
        self(opcode, payload)
    }
}

/// What happened to an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A push was written to the store
    Stored { key: u16, len: usize },
    /// A push without payload, dropped
    Ignored,
    /// Handed to the application handler
    Forwarded { opcode: u16 },
    /// No application handler installed
    Unhandled { opcode: u16 },
}

/// Receive side of the host link
///
/// Owns the store so that every catalogue mutation comes through this one
/// receive path.
pub struct HostLink {
    store: VirtualNvram,
    opcodes: TransportConfig,
    app_handler: Option<Box<dyn AppHandler>>,
}

impl std::fmt::Debug for HostLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLink")
            .field("store", &self.store)
            .field("opcodes", &self.opcodes)
            .field("app_handler", &self.app_handler.is_some())
            .finish()
    }
}

impl HostLink {
    pub fn new(store: VirtualNvram, opcodes: TransportConfig) -> Self {
        Self {
            store,
            opcodes,
            app_handler: None,
        }
    }

    /// Install the handler receiving every non-NVRAM opcode
    pub fn with_app_handler(mut self, handler: impl AppHandler + 'static) -> Self {
        self.app_handler = Some(Box::new(handler));
        self
    }

    pub fn store(&self) -> &VirtualNvram {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VirtualNvram {
        &mut self.store
    }

    /// Decode and route one received buffer
    pub fn handle_bytes(&mut self, buf: &[u8]) -> Result<Dispatch> {
        let frame = Frame::decode(buf)?;
        self.handle_frame(&frame)
    }

    /// Route one decoded frame
    pub fn handle_frame(&mut self, frame: &Frame) -> Result<Dispatch> {
        trace!(opcode = frame.opcode, len = frame.payload.len(), "Received frame");

        if frame.opcode == self.opcodes.push_nvram_command {
            return self.push_nvram(&frame.payload);
        }

        match self.app_handler.as_mut() {
            Some(handler) => {
                handler.handle(frame.opcode, &frame.payload);
                Ok(Dispatch::Forwarded {
                    opcode: frame.opcode,
                })
            }
            None => {
                debug!(opcode = frame.opcode, "No handler for opcode");
                Ok(Dispatch::Unhandled {
                    opcode: frame.opcode,
                })
            }
        }
    }

    fn push_nvram(&mut self, payload: &[u8]) -> Result<Dispatch> {
        if payload.is_empty() {
            debug!("Ignoring empty NVRAM push");
            return Ok(Dispatch::Ignored);
        }

        let (key, data) = decode_nvram_content(payload)?;
        let len = self.store.write(key, data)?;
        Ok(Dispatch::Stored { key, len })
    }
}
