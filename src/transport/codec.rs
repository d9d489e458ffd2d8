//! Host link wire format
//!
//! Every message, in either direction, is one frame. All integers are
//! little-endian.
//!
//! ```text
//! frame:          [opcode: u16][payload_len: u16][payload ...]
//! push / write:   [key: u16][data ...]
//! delete:         [key: u16]
//! ```

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Opcode plus payload length
pub const FRAME_HEADER_LEN: usize = 4;

/// Size of an NVRAM key on the wire
pub const KEY_LEN: usize = 2;

/// Largest payload a frame can carry
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// One host link message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Parse a frame from a received buffer
    ///
    /// Bytes beyond the declared payload length are ignored.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(Error::Decode(format!(
                "frame too short: {} bytes, need at least {}",
                buf.len(),
                FRAME_HEADER_LEN
            )));
        }

        let opcode = buf.get_u16_le();
        let payload_len = buf.get_u16_le() as usize;
        if buf.remaining() < payload_len {
            return Err(Error::Decode(format!(
                "incomplete frame 0x{:04x}: expected {} payload bytes, got {}",
                opcode,
                payload_len,
                buf.remaining()
            )));
        }

        Ok(Self {
            opcode,
            payload: Bytes::copy_from_slice(&buf[..payload_len]),
        })
    }

    /// Serialize to bytes with the header prepended
    pub fn encode(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidArgument(format!(
                "frame payload of {} bytes exceeds {}",
                self.payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        out.put_u16_le(self.opcode);
        out.put_u16_le(self.payload.len() as u16);
        out.put_slice(&self.payload);
        Ok(out.freeze())
    }
}

/// Build a key-prefixed NVRAM payload
pub fn encode_nvram_content(key: u16, data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(KEY_LEN + data.len());
    out.put_u16_le(key);
    out.put_slice(data);
    out.freeze()
}

/// Split a key-prefixed NVRAM payload into key and data
pub fn decode_nvram_content(mut payload: &[u8]) -> Result<(u16, &[u8])> {
    if payload.len() < KEY_LEN {
        return Err(Error::Decode(format!(
            "NVRAM payload too short: {} bytes",
            payload.len()
        )));
    }
    let key = payload.get_u16_le();
    Ok((key, payload))
}

/// Frame announcing that `key` now holds `data`
pub fn write_event(opcodes: &TransportConfig, key: u16, data: &[u8]) -> Frame {
    Frame::new(opcodes.write_nvram_event, encode_nvram_content(key, data))
}

/// Frame announcing that `key` was removed
pub fn delete_event(opcodes: &TransportConfig, key: u16) -> Frame {
    Frame::new(opcodes.delete_nvram_event, encode_nvram_content(key, &[]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_push_frame() -> Result<()> {
        let raw = [0x05, 0x29, 0x05, 0x00, 0x34, 0x12, b'a', b'b', b'c'];
        let frame = Frame::decode(&raw)?;
        assert_eq!(frame.opcode, 0x2905);
        assert_eq!(frame.payload.len(), 5);

        let (key, data) = decode_nvram_content(&frame.payload)?;
        assert_eq!(key, 0x1234);
        assert_eq!(data, b"abc");

        Ok(())
    }

    #[test]
    fn test_decode_rejects_short_frames() {
        assert!(matches!(Frame::decode(&[0x01, 0x02, 0x03]), Err(Error::Decode(_))));
        // Declares 4 payload bytes, carries 2
        assert!(Frame::decode(&[0x01, 0x00, 0x04, 0x00, 0xAA, 0xBB]).is_err());
        assert!(decode_nvram_content(&[0x01]).is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() -> Result<()> {
        let frame = Frame::decode(&[0x10, 0x00, 0x01, 0x00, 0xAA, 0xBB])?;
        assert_eq!(frame.payload.as_ref(), &[0xAA]);
        Ok(())
    }

    #[test]
    fn test_event_layout() -> Result<()> {
        let opcodes = TransportConfig::default();

        let write = write_event(&opcodes, 7, b"xy").encode()?;
        assert_eq!(write.as_ref(), &[0x82, 0x29, 0x04, 0x00, 0x07, 0x00, b'x', b'y']);

        let delete = delete_event(&opcodes, 0x0102).encode()?;
        assert_eq!(delete.as_ref(), &[0x83, 0x29, 0x02, 0x00, 0x02, 0x01]);

        Ok(())
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let frame = Frame::new(1, vec![0u8; MAX_PAYLOAD_LEN + 1]);
        assert!(matches!(frame.encode(), Err(Error::InvalidArgument(_))));
    }
}
