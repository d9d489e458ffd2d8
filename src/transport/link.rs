//! Framed transport over a byte sink

use super::codec::{delete_event, write_event, Frame};
use super::HostTransport;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::Write;
use tracing::debug;

/// Sends notifications as encoded frames to any writer (UART, pipe, file)
pub struct WriterTransport<W> {
    sink: Mutex<W>,
    opcodes: TransportConfig,
}

impl<W: Write + Send> WriterTransport<W> {
    pub fn new(sink: W, opcodes: TransportConfig) -> Self {
        Self {
            sink: Mutex::new(sink),
            opcodes,
        }
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        let bytes = frame.encode()?;
        let mut sink = self.sink.lock();
        sink.write_all(&bytes)
            .and_then(|_| sink.flush())
            .map_err(|e| Error::Transport(format!("Write failed: {}", e)))?;

        debug!(opcode = frame.opcode, len = bytes.len(), "Sent frame to host");
        Ok(())
    }
}

impl<W: Write + Send> HostTransport for WriterTransport<W> {
    fn notify_write(&self, key: u16, payload: &[u8]) -> Result<()> {
        self.send(write_event(&self.opcodes, key, payload))
    }

    fn notify_delete(&self, key: u16) -> Result<()> {
        self.send(delete_event(&self.opcodes, key))
    }
}
