//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than a header
    #[error("incomplete header: need {needed} bytes, got {got}")]
    Incomplete {
        /// Bytes required for a header
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// Declared payload length runs past the end of the message
    #[error("truncated payload: declared {declared} bytes, {available} available")]
    Truncated {
        /// Length field from the header
        declared: u32,
        /// Payload bytes actually present
        available: usize,
    },

    /// Payload does not fit in the 32-bit length field
    #[error("size limit exceeded: {0}")]
    Size(usize),
}
