//! Session state machine.
//!
//! A `Session` owns at most one transport at a time and drives it through
//! login, liveness monitoring, reconnection with backoff and logout. Every
//! transport is tagged with a generation; handlers for a transport that is no
//! longer the current link are ignored.

use bytes::Bytes;
use futures::future::BoxFuture;
use link_wire::{ping_frame, Frame, FrameHeader};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::attempt::{attempt, AttemptResult};
use crate::config::{Endpoint, SessionConfig};
use crate::error::LinkError;
use crate::liveness::{LivenessClock, LivenessLoops};
use crate::retry::retry_with_backoff;
use crate::transport::{Connection, Connector, Outbound, TransportEvent};

/// Lifecycle states of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not connected, no attempt in flight
    Init,
    /// A login attempt is in flight
    Connecting,
    /// Link open, liveness loops running
    Connected,
    /// Link lost, backoff scheduler running
    Reconnecting,
    /// Logout requested, waiting for the transport to close
    Closing,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Whether the state is `Closing` or `Closed`
    pub fn is_shutting_down(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "init",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of a `login()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// A new link is open
    Success,
    /// The attempt timed out
    Timeout,
    /// The attempt failed, or the session cannot log in from its current state
    LoginFailed,
    /// Already connected; nothing was done
    Logined,
}

impl LoginStatus {
    /// Whether the session is connected after this status
    pub fn is_connected(self) -> bool {
        matches!(self, LoginStatus::Success | LoginStatus::Logined)
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStatus::Success => "Success",
            LoginStatus::Timeout => "Timeout",
            LoginStatus::LoginFailed => "LoginFailed",
            LoginStatus::Logined => "Logined",
        };
        f.write_str(name)
    }
}

/// Events emitted by sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session changed state
    StateChanged {
        /// Previous state
        from: SessionState,
        /// New state
        to: SessionState,
    },
    /// A liveness reply arrived
    LivenessReply,
    /// An application frame arrived
    Frame {
        /// Command code
        command: u16,
        /// Payload bytes
        payload: Bytes,
    },
    /// The session reached `Closed`
    Closed {
        /// Why the session closed
        reason: String,
    },
}

/// Handle for receiving session events
pub struct SessionHandle {
    /// Channel for receiving events
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// The transport currently owned by the session
struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    pump: AbortHandle,
}

/// Mutable session state, only touched under the lock
struct Core {
    state: SessionState,
    generation: u64,
    link: Option<Link>,
    loops: LivenessLoops,
    reconnect: Option<AbortHandle>,
    clock: LivenessClock,
}

impl Core {
    fn is_current(&self, generation: u64) -> bool {
        self.link.as_ref().map(|link| link.generation) == Some(generation)
    }
}

struct Shared {
    endpoint: Endpoint,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    core: Mutex<Core>,
    state_tx: watch::Sender<SessionState>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

/// A resilient client session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Create a session in `Init` and the handle that receives its events.
    ///
    /// Fails with `InvalidConfig` when a liveness period is zero.
    pub fn new(
        endpoint: Endpoint,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<(Self, SessionHandle), LinkError> {
        config.validate()?;
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Init);

        let core = Core {
            state: SessionState::Init,
            generation: 0,
            link: None,
            loops: LivenessLoops::default(),
            reconnect: None,
            clock: LivenessClock::new(Instant::now()),
        };

        let session = Self {
            shared: Arc::new(Shared {
                endpoint,
                config,
                connector,
                core: Mutex::new(core),
                state_tx,
                event_tx,
            }),
        };

        Ok((session, SessionHandle { events }))
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    /// Watch state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the session reaches `target`
    pub async fn wait_for_state(&self, target: SessionState) {
        let mut rx = self.subscribe_state();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Endpoint this session connects to
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Time of the last inbound frame on any link of this session
    pub async fn last_message_at(&self) -> Instant {
        self.shared.core.lock().await.clock.last_message_at()
    }

    /// Whether the liveness loops are installed
    pub async fn liveness_running(&self) -> bool {
        self.shared.core.lock().await.loops.is_running()
    }

    /// Log in.
    ///
    /// Returns `Logined` without touching the transport when already
    /// connected. On timeout or failure the session returns to `Init`. While a
    /// reconnection cycle owns the session the call returns `LoginFailed` and
    /// leaves the cycle to reach `Connected` or `Closed`.
    pub async fn login(&self) -> LoginStatus {
        self.try_login(false).await
    }

    /// One login attempt. `scheduled` marks attempts made by the backoff
    /// scheduler, the only ones allowed to start from `Reconnecting`.
    async fn try_login(&self, scheduled: bool) -> LoginStatus {
        let previous = {
            let mut core = self.shared.core.lock().await;
            match (core.state, scheduled) {
                (SessionState::Connected, _) => return LoginStatus::Logined,
                (SessionState::Init, false) | (SessionState::Reconnecting, true) => {}
                (state, _) => {
                    warn!("Cannot log in while {}", state);
                    return LoginStatus::LoginFailed;
                }
            }
            let previous = core.state;
            self.transition(&mut core, SessionState::Connecting);
            previous
        };

        let url = self.shared.endpoint.url();
        let result = attempt(
            self.shared.connector.as_ref(),
            &url,
            self.shared.config.login_timeout,
        )
        .await;

        let mut core = self.shared.core.lock().await;
        if core.state != SessionState::Connecting {
            // Logged out while the attempt was in flight
            if let AttemptResult::Success(connection) = result {
                connection.close();
            }
            if core.state == SessionState::Closing {
                self.finish_close(&mut core, "logged out during login");
            }
            return LoginStatus::LoginFailed;
        }

        match result {
            AttemptResult::Success(connection) => {
                info!("Login to {} succeeded", url);
                self.attach(&mut core, connection);
                LoginStatus::Success
            }
            AttemptResult::Timeout => {
                warn!("Login to {} timed out", url);
                self.transition(&mut core, previous);
                LoginStatus::Timeout
            }
            AttemptResult::Failed(reason) => {
                warn!("Login to {} failed: {}", url, reason);
                self.transition(&mut core, previous);
                LoginStatus::LoginFailed
            }
        }
    }

    /// Log out. A second call while closing is a no-op.
    ///
    /// With a link the transport is asked to close and its close event
    /// completes the transition to `Closed`; without one the session closes
    /// immediately.
    pub async fn logout(&self) {
        let mut core = self.shared.core.lock().await;
        if core.state.is_shutting_down() {
            return;
        }

        if let Some(handle) = core.reconnect.take() {
            handle.abort();
        }
        self.transition(&mut core, SessionState::Closing);

        let requested = match core.link.as_ref() {
            Some(link) => link.outbound.send(Outbound::Close).is_ok(),
            None => false,
        };

        if requested {
            info!("Link to {} closing", self.shared.endpoint.url());
        } else {
            self.finish_close(&mut core, "logout");
        }
    }

    /// Send an application frame on the current link.
    ///
    /// A write to a transport that is already gone is treated as a link
    /// failure and starts a reconnection cycle.
    pub async fn send(&self, command: u16, payload: impl Into<Bytes>) -> Result<(), LinkError> {
        let bytes = Frame::new(command, payload).encode()?;

        let mut core = self.shared.core.lock().await;
        if core.state != SessionState::Connected {
            return Err(LinkError::NotConnected);
        }
        let Some(link) = core.link.as_ref() else {
            return Err(LinkError::NotConnected);
        };

        if link.outbound.send(Outbound::Frame(bytes)).is_err() {
            let err = LinkError::Transport("write to closed transport".to_string());
            self.fail_locked(&mut core, err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Heartbeat tick. Returns whether the loop should keep running.
    pub(crate) async fn send_probe(&self, generation: u64) -> bool {
        let mut core = self.shared.core.lock().await;
        if core.state != SessionState::Connected || !core.is_current(generation) {
            return false;
        }

        let sent = core
            .link
            .as_ref()
            .map(|link| link.outbound.send(Outbound::Frame(ping_frame())).is_ok())
            .unwrap_or(false);

        if !sent {
            self.fail_locked(&mut core, LinkError::Transport("failed to send heartbeat".to_string()));
            return false;
        }

        debug!("Sent PING (generation {})", generation);
        true
    }

    /// Read deadline tick. Returns whether the loop should keep running.
    pub(crate) async fn check_deadline(&self, generation: u64) -> bool {
        let mut core = self.shared.core.lock().await;
        if core.state != SessionState::Connected || !core.is_current(generation) {
            return false;
        }

        let silence = core.clock.silence(Instant::now());
        if silence > self.shared.config.read_deadline() {
            self.fail_locked(&mut core, LinkError::LivenessTimeout(silence));
            return false;
        }
        true
    }

    /// Install a freshly opened transport as the connected link
    fn attach(&self, core: &mut Core, connection: Connection) {
        core.generation += 1;
        let generation = core.generation;
        let Connection { outbound, events } = connection;

        let pump = tokio::spawn(self.clone().pump(generation, events)).abort_handle();
        core.link = Some(Link {
            generation,
            outbound,
            pump,
        });
        core.clock.touch(Instant::now());
        self.transition(core, SessionState::Connected);

        let config = &self.shared.config;
        core.loops.start(
            self,
            generation,
            config.heartbeat_interval,
            config.deadline_poll_interval,
        );
    }

    /// Drop the current link, asking the transport to close
    fn detach(&self, core: &mut Core) {
        core.loops.stop();
        if let Some(link) = core.link.take() {
            link.pump.abort();
            let _ = link.outbound.send(Outbound::Close);
        }
    }

    /// Deliver transport events for one link generation to the handlers
    async fn pump(self, generation: u64, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(bytes) => self.on_message(generation, bytes).await,
                TransportEvent::Error(reason) => {
                    info!("Link error: {}", reason);
                    self.handle_failure(generation, LinkError::Transport(reason)).await;
                }
                TransportEvent::Closed(reason) => {
                    self.on_close(generation, reason).await;
                    return;
                }
            }
        }
        self.on_close(generation, "transport event stream ended".to_string())
            .await;
    }

    async fn on_message(&self, generation: u64, bytes: Bytes) {
        let mut core = self.shared.core.lock().await;
        if !core.is_current(generation) {
            return;
        }
        core.clock.touch(Instant::now());

        match FrameHeader::parse(&bytes) {
            Ok(header) if header.is_liveness() => {
                debug!("Received PONG (generation {})", generation);
                self.emit(SessionEvent::LivenessReply);
            }
            Ok(_) => match Frame::decode(&bytes) {
                Ok(frame) => self.emit(SessionEvent::Frame {
                    command: frame.command,
                    payload: frame.payload,
                }),
                Err(e) => warn!("Ignoring malformed frame: {}", e),
            },
            Err(e) => warn!("Ignoring malformed frame: {}", e),
        }
    }

    async fn on_close(&self, generation: u64, reason: String) {
        let mut core = self.shared.core.lock().await;
        if !core.is_current(generation) {
            return;
        }

        if core.state == SessionState::Closing {
            info!("Link closed, the reason is logout");
            self.finish_close(&mut core, "logout");
            return;
        }

        debug!("Link closed unexpectedly: {}", reason);
        self.fail_locked(&mut core, LinkError::UnsolicitedClose(reason));
    }

    async fn handle_failure(&self, generation: u64, cause: LinkError) {
        let mut core = self.shared.core.lock().await;
        if !core.is_current(generation) {
            debug!("Ignoring failure from stale link: {}", cause);
            return;
        }
        self.fail_locked(&mut core, cause);
    }

    /// Error handler: route a link failure into a reconnection cycle
    fn fail_locked(&self, core: &mut Core, cause: LinkError) {
        if core.state.is_shutting_down() {
            debug!("Ignoring {} while {}", cause, core.state);
            return;
        }
        if core.state == SessionState::Reconnecting {
            return;
        }

        warn!("Link failed: {}; trying to reconnect", cause);
        self.detach(core);
        self.transition(core, SessionState::Reconnecting);

        if let Some(handle) = core.reconnect.take() {
            handle.abort();
        }
        core.reconnect = Some(tokio::spawn(self.clone().reconnect()).abort_handle());
    }

    /// Drive `login` through the backoff scheduler
    fn reconnect(self) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let policy = self.shared.config.retry.clone();
            let result = retry_with_backoff(&policy, || {
                let session = self.clone();
                async move {
                    info!("Trying to log in again");
                    match session.try_login(true).await {
                        status if status.is_connected() => Ok(()),
                        status => Err(LinkError::LoginFailed(status.to_string())),
                    }
                }
            })
            .await;

            match result {
                Ok(()) => info!("Reconnection succeeded"),
                Err(exhausted) => {
                    error!("Too many retries: {}", exhausted);
                    let mut core = self.shared.core.lock().await;
                    if core.state == SessionState::Reconnecting {
                        let reason = LinkError::RetriesExhausted(exhausted.attempts).to_string();
                        self.finish_close(&mut core, &reason);
                    }
                }
            }
        })
    }

    fn finish_close(&self, core: &mut Core, reason: &str) {
        self.detach(core);
        info!("Link closed, the reason is {}", reason);
        self.transition(core, SessionState::Closed);
        self.emit(SessionEvent::Closed {
            reason: reason.to_string(),
        });
    }

    fn transition(&self, core: &mut Core, to: SessionState) {
        let from = core.state;
        if from == to {
            return;
        }
        if from == SessionState::Connected {
            core.loops.stop();
        }

        core.state = to;
        self.shared.state_tx.send_replace(to);
        debug!("Session state {} -> {}", from, to);
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.shared.event_tx.send(event);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.shared.endpoint.url())
            .field("state", &self.state())
            .finish()
    }
}
