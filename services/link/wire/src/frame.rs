//! Complete frames: header plus payload.

use crate::header::{FrameHeader, HEADER_SIZE, PING_CODE};
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded link frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code
    pub command: u16,
    /// Payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(command: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// Total encoded size
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode header and payload into one message
    pub fn encode(&self) -> Result<Bytes, crate::WireError> {
        let length = u32::try_from(self.payload.len())
            .map_err(|_| crate::WireError::Size(self.payload.len()))?;

        let mut buf = BytesMut::with_capacity(self.encoded_size());
        FrameHeader::new(self.command, length).encode(&mut buf);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Decode a frame from one message.
    ///
    /// Exactly `length` payload bytes are taken; anything after them is ignored.
    pub fn decode(message: &[u8]) -> Result<Self, crate::WireError> {
        let header = FrameHeader::parse(message)?;
        let available = message.len() - HEADER_SIZE;
        let declared = header.length as usize;

        if declared > available {
            return Err(crate::WireError::Truncated {
                declared: header.length,
                available,
            });
        }

        Ok(Self {
            command: header.command,
            payload: Bytes::copy_from_slice(&message[HEADER_SIZE..HEADER_SIZE + declared]),
        })
    }
}

/// The fixed liveness probe: command 100, empty payload
pub fn ping_frame() -> Bytes {
    Bytes::from_static(&[0, PING_CODE as u8, 0, 0, 0, 0])
}
