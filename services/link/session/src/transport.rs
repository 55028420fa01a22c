//! Transport adapter seam and the WebSocket implementation.
//!
//! A transport is a pair of channels: outbound commands flow into a writer,
//! inbound events flow out of a reader. The session never touches the socket
//! directly, which lets tests drive it with an in-memory connector.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Commands accepted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send one binary message
    Frame(Bytes),
    /// Start a close handshake
    Close,
}

/// Events delivered by a transport, in socket order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound message
    Message(Bytes),
    /// Socket error after open
    Error(String),
    /// The link is closed; the reason is empty when none was given
    Closed(String),
}

/// An opened transport
#[derive(Debug)]
pub struct Connection {
    /// Outbound command channel
    pub outbound: mpsc::UnboundedSender<Outbound>,
    /// Inbound event channel
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    /// Ask the transport to close; a no-op if it is already gone
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Opens transports. Resolving `Ok` means the transport reported "opened".
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a new connector
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("WebSocket opened to {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Reader: socket -> events
        let reader_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(result) = read.next().await {
                let event = match result {
                    Ok(Message::Binary(data)) => TransportEvent::Message(Bytes::from(data)),
                    Ok(Message::Text(text)) => TransportEvent::Message(Bytes::from(text.into_bytes())),
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        let _ = reader_events.send(TransportEvent::Closed(reason));
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = reader_events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                };

                if reader_events.send(event).is_err() {
                    return;
                }
            }
            let _ = reader_events.send(TransportEvent::Closed(String::new()));
        });

        // Writer: commands -> socket
        tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                match command {
                    Outbound::Frame(bytes) => {
                        if let Err(e) = write.send(Message::Binary(bytes.to_vec())).await {
                            warn!("WebSocket write failed: {}", e);
                            let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                            return;
                        }
                    }
                    Outbound::Close => break,
                }
            }
            if let Err(e) = write.close().await {
                debug!("WebSocket close failed: {}", e);
            }
        });

        Ok(Connection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
