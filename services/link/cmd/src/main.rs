//! Link client binary.
//!
//! Opens one resilient session against a WebSocket endpoint, keeps it alive
//! with heartbeats and automatic reconnection, and logs out on Ctrl-C.

use clap::Parser;
use link_session::{Endpoint, LoginStatus, Session, SessionEvent, SessionState, WsConnector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::LinkConfig;
use logging::LinkLogFormatter;

/// Resilient WebSocket link client
#[derive(Parser, Debug)]
#[command(name = "wslink", version, about = "Resilient WebSocket link client")]
struct Args {
    /// WebSocket endpoint, e.g. ws://127.0.0.1:8080/ws
    #[arg(long)]
    server_url: Option<String>,

    /// Identity sent as the `user` query parameter
    #[arg(long)]
    user: Option<String>,

    /// Heartbeat interval, e.g. 10s
    #[arg(long)]
    heartbeat_interval: Option<humantime::Duration>,

    /// Login attempt timeout, e.g. 5s
    #[arg(long)]
    login_timeout: Option<humantime::Duration>,

    /// Reconnect retries after the first attempt
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base backoff interval, e.g. 500ms
    #[arg(long)]
    retry_base_interval: Option<humantime::Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

impl Args {
    /// Command-line flags win over file and environment values
    fn apply(&self, config: &mut LinkConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(interval) = &self.heartbeat_interval {
            config.heartbeat_interval_ms = millis(**interval);
        }
        if let Some(timeout) = &self.login_timeout {
            config.login_timeout_ms = millis(**timeout);
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(base) = &self.retry_base_interval {
            config.retry_base_interval_ms = millis(**base);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("wslink={}", args.log_level).parse()?)
        .add_directive(format!("link_session={}", args.log_level).parse()?)
        .add_directive(format!("link_wire={}", args.log_level).parse()?);

    let formatter = LinkLogFormatter::new("wslink".to_string(), logging::is_terminal());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .event_format(formatter)
        .init();

    info!("Starting link client v{}", env!("CARGO_PKG_VERSION"));

    let mut link_config = LinkConfig::load_from_file(&args.config)?;
    args.apply(&mut link_config);

    let endpoint = Endpoint::new(&link_config.server_url, link_config.user.clone())?;
    let session_config = link_config.session_config();
    info!(
        "Session config: heartbeat={:?}, read_deadline={:?}, login_timeout={:?}, retry={:?}",
        session_config.heartbeat_interval,
        session_config.read_deadline(),
        session_config.login_timeout,
        session_config.retry
    );

    let (session, mut handle) = Session::new(endpoint, session_config, Arc::new(WsConnector::new()))?;

    let status = session.login().await;
    if status != LoginStatus::Success {
        anyhow::bail!("Login to {} failed: {}", session.endpoint().url(), status);
    }
    component_info!("cli", "Logged in as {}", session.endpoint().identity());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                component_info!("cli", "Interrupt received, logging out");
                session.logout().await;
                if tokio::time::timeout(Duration::from_secs(5), session.wait_for_state(SessionState::Closed))
                    .await
                    .is_err()
                {
                    component_warn!("cli", "Server did not confirm close, exiting anyway");
                }
                break;
            }

            event = handle.events.recv() => {
                match event {
                    Some(SessionEvent::StateChanged { from, to }) => {
                        info!("Session state {} -> {}", from, to);
                    }
                    Some(SessionEvent::LivenessReply) => {
                        debug!("<<<<<<<<<<< pong");
                    }
                    Some(SessionEvent::Frame { command, payload }) => {
                        info!("Received frame command={} ({} bytes)", command, payload.len());
                    }
                    Some(SessionEvent::Closed { reason }) => {
                        error!("Session closed: {}", reason);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("Link client stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "wslink",
            "--server-url",
            "ws://10.0.0.1:9000/ws",
            "--heartbeat-interval",
            "2s",
            "--retry-base-interval",
            "250ms",
        ]);

        let mut config = LinkConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server_url, "ws://10.0.0.1:9000/ws");
        assert_eq!(config.user, "guest");
        assert_eq!(config.heartbeat_interval_ms, 2000);
        assert_eq!(config.retry_base_interval_ms, 250);
        assert_eq!(config.max_retries, 3);
    }
}
