//! Command/length framing for the link protocol.
//!
//! Every application message carried over the link is a single binary
//! WebSocket message laid out as a fixed 6-byte header followed by the payload.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u16 command          | big-endian command code    |
//! +----------------------+----------------------------+
//! | u32 length           | payload length in bytes    |
//! +----------------------+----------------------------+
//! | payload              | variable (0..length)       |
//! +----------------------+----------------------------+
//! ```
//!
//! Command code 100 is the liveness probe; the client sends it with an empty
//! payload and treats any inbound frame carrying it as a liveness reply.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod header;

// Re-export main types
pub use error::WireError;
pub use frame::{ping_frame, Frame};
pub use header::{FrameHeader, HEADER_SIZE, PING_CODE};
