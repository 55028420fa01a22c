//! Login, heartbeat, read deadline and backoff reconnection for a link session.
//!
//! This crate keeps one logical session alive against a WebSocket endpoint
//! across transient network failures. A session logs in with a timed
//! connection attempt, then runs two liveness loops while connected: one sends
//! a probe frame every heartbeat interval, the other declares the link dead
//! when nothing has been received for three heartbeat intervals. Transport
//! errors, unsolicited closes and liveness timeouts all lead to the same
//! reconnection cycle, driven by an exponential backoff scheduler.
//!
//! ## Features
//!
//! - **Timed login**: each attempt resolves to success, timeout or failure
//! - **Heartbeat**: fixed 6-byte probe frames on a configurable interval
//! - **Read deadline**: silence detection polled independently of the heartbeat
//! - **Auto-reconnect**: exponential backoff with a retry cap
//! - **Generation tagging**: events from a replaced transport are ignored
//!
//! ## Example
//!
//! ```rust,no_run
//! use link_session::{Endpoint, LoginStatus, Session, SessionConfig, SessionEvent, WsConnector};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let endpoint = Endpoint::new("ws://127.0.0.1:8080/ws", "alice")?;
//! let (session, mut handle) = Session::new(endpoint, SessionConfig::default(), Arc::new(WsConnector::new()))?;
//!
//! if session.login().await != LoginStatus::Success {
//!     anyhow::bail!("login failed");
//! }
//!
//! while let Some(event) = handle.events.recv().await {
//!     match event {
//!         SessionEvent::StateChanged { from, to } => println!("{} -> {}", from, to),
//!         SessionEvent::LivenessReply => println!("pong"),
//!         SessionEvent::Frame { command, payload } => {
//!             println!("frame {} with {} bytes", command, payload.len());
//!         }
//!         SessionEvent::Closed { reason } => {
//!             println!("closed: {}", reason);
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attempt;
pub mod config;
pub mod error;
pub mod liveness;
pub mod retry;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types
pub use attempt::{attempt, AttemptResult};
pub use config::{Endpoint, SessionConfig};
pub use error::{LinkError, TransportError};
pub use liveness::LivenessClock;
pub use retry::{retry_with_backoff, RetriesExhausted, RetryPolicy};
pub use session::{LoginStatus, Session, SessionEvent, SessionHandle, SessionState};
pub use transport::{Connection, Connector, Outbound, TransportEvent, WsConnector};
