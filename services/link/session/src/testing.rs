//! In-memory connector for driving sessions in tests.

use crate::error::TransportError;
use crate::transport::{Connection, Connector, Outbound, TransportEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// What the next `connect` call does
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Open immediately and hand the far end to the test
    Accept,
    /// Fail with the given reason
    Refuse(&'static str),
    /// Never resolve
    Hang,
}

/// Far end of an accepted mock transport
pub(crate) struct Remote {
    /// Commands the session sent
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    /// Events to deliver to the session
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl Remote {
    /// Deliver an inbound message
    pub fn deliver(&self, bytes: impl Into<bytes::Bytes>) {
        let _ = self.events.send(TransportEvent::Message(bytes.into()));
    }

    /// Next outbound command
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }
}

pub(crate) struct MockConnector {
    script: Mutex<VecDeque<Script>>,
    remotes: mpsc::UnboundedSender<Remote>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(
        script: impl IntoIterator<Item = Script>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
        let (remotes, remote_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            remotes,
            attempts: AtomicUsize::new(0),
        });
        (connector, remote_rx)
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Connection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Script::Refuse("no scripted attempt left"));

        match step {
            Script::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                let _ = self.remotes.send(Remote {
                    outbound: outbound_rx,
                    events: event_tx,
                });
                Ok(Connection {
                    outbound: outbound_tx,
                    events: event_rx,
                })
            }
            Script::Refuse(reason) => Err(TransportError::Connect(reason.to_string())),
            Script::Hang => std::future::pending().await,
        }
    }
}
