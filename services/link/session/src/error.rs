//! Error types for link sessions.

use link_wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while opening a transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The socket or WebSocket handshake could not be established
    #[error("connect failed: {0}")]
    Connect(String),
}

/// Session level errors.
///
/// `Transport`, `UnsolicitedClose` and `LivenessTimeout` raised on a live link
/// all lead into the reconnection path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A login attempt could not open the transport or timed out
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Socket error after the link was established
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side closed the link without a local logout
    #[error("connection closed by remote: {0}")]
    UnsolicitedClose(String),

    /// No inbound frame arrived within the read deadline
    #[error("read deadline exceeded after {0:?} of silence")]
    LivenessTimeout(Duration),

    /// The backoff scheduler gave up
    #[error("max retries exceeded: {0}")]
    RetriesExhausted(u32),

    /// No transport is currently owned
    #[error("not connected")]
    NotConnected,

    /// The endpoint URL could not be parsed
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A session tunable is out of range
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// Outbound frame could not be encoded
    #[error(transparent)]
    Wire(#[from] WireError),
}
