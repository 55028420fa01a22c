//! Fixed 6-byte frame header.

use bytes::{Buf, BufMut, BytesMut};

/// Header size in bytes (u16 command + u32 length)
pub const HEADER_SIZE: usize = 6;

/// Liveness probe command code
pub const PING_CODE: u16 = 100;

/// Frame header: command code and payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Command code
    pub command: u16,
    /// Payload length in bytes
    pub length: u32,
}

impl FrameHeader {
    /// Create a header for the given command and payload length
    pub fn new(command: u16, length: u32) -> Self {
        Self { command, length }
    }

    /// Whether this header marks a liveness probe reply
    pub fn is_liveness(&self) -> bool {
        self.command == PING_CODE
    }

    /// Encode the header to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.command);
        buf.put_u32(self.length);
    }

    /// Parse the header from the front of `message` without touching the payload
    pub fn parse(message: &[u8]) -> Result<Self, crate::WireError> {
        if message.len() < HEADER_SIZE {
            return Err(crate::WireError::Incomplete {
                needed: HEADER_SIZE,
                got: message.len(),
            });
        }

        let mut buf = &message[..HEADER_SIZE];
        let command = buf.get_u16();
        let length = buf.get_u32();

        Ok(Self { command, length })
    }
}
