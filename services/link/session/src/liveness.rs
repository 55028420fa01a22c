//! Liveness monitoring: heartbeat emission and read-deadline enforcement.
//!
//! Both loops are spawned when a transport becomes the connected link and
//! are aborted on every transition away from `Connected`. Each tick also
//! re-checks the session so a tick racing the abort does nothing.

use crate::session::Session;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Monotonic record of the last inbound frame
#[derive(Debug, Clone, Copy)]
pub struct LivenessClock {
    last_message_at: Instant,
}

impl LivenessClock {
    /// Start the clock at `now`
    pub fn new(now: Instant) -> Self {
        Self { last_message_at: now }
    }

    /// Record inbound activity; the timestamp never moves backwards
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_message_at {
            self.last_message_at = now;
        }
    }

    /// Time of the last inbound frame
    pub fn last_message_at(&self) -> Instant {
        self.last_message_at
    }

    /// Silence since the last inbound frame
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_message_at)
    }
}

/// Handles to the two running loops for one link generation
#[derive(Debug, Default)]
pub(crate) struct LivenessLoops {
    heartbeat: Option<AbortHandle>,
    deadline: Option<AbortHandle>,
}

impl LivenessLoops {
    /// Start both loops for `generation`, replacing any running ones
    pub(crate) fn start(
        &mut self,
        session: &Session,
        generation: u64,
        heartbeat_interval: Duration,
        poll_interval: Duration,
    ) {
        self.stop();
        self.heartbeat = Some(spawn_heartbeat(session.clone(), generation, heartbeat_interval));
        self.deadline = Some(spawn_deadline(session.clone(), generation, poll_interval));
    }

    /// Abort both loops
    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }

    /// Whether loops are currently installed
    pub(crate) fn is_running(&self) -> bool {
        self.heartbeat.is_some() && self.deadline.is_some()
    }
}

fn spawn_heartbeat(session: Session, generation: u64, period: Duration) -> AbortHandle {
    tokio::spawn(async move {
        debug!("Heartbeat loop started (generation {})", generation);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !session.send_probe(generation).await {
                debug!("Link not connected, heartbeat loop exited");
                break;
            }
        }
    })
    .abort_handle()
}

fn spawn_deadline(session: Session, generation: u64, period: Duration) -> AbortHandle {
    tokio::spawn(async move {
        debug!("Read deadline loop started (generation {})", generation);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !session.check_deadline(generation).await {
                debug!("Link not connected, read deadline loop exited");
                break;
            }
        }
    })
    .abort_handle()
}
