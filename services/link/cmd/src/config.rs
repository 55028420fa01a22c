//! Configuration handling for the link client.
//!
//! Values come from the `link` section of a YAML file, then environment
//! variables, then command-line flags (applied by the caller).

use anyhow::Result;
use link_session::{RetryPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Link client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// WebSocket endpoint, e.g. ws://127.0.0.1:8080/ws
    pub server_url: String,
    /// Identity appended to the URL as `user`
    pub user: String,
    /// Heartbeat interval (milliseconds)
    pub heartbeat_interval_ms: u64,
    /// Read deadline as a multiple of the heartbeat interval
    pub deadline_multiplier: u32,
    /// Read deadline poll interval (milliseconds)
    pub deadline_poll_interval_ms: u64,
    /// Login attempt timeout (milliseconds)
    pub login_timeout_ms: u64,
    /// Reconnect retries after the first attempt
    pub max_retries: u32,
    /// Base backoff interval (milliseconds)
    pub retry_base_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            user: "guest".to_string(),
            heartbeat_interval_ms: 10_000,
            deadline_multiplier: 3,
            deadline_poll_interval_ms: 1_000,
            login_timeout_ms: 5_000,
            max_retries: 3,
            retry_base_interval_ms: 500,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    link: Option<LinkConfig>,
}

impl LinkConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    if let Some(link) = root.link {
                        config = link;
                    }
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", config_path.as_ref(), e);
                }
            }
        } else {
            warn!("Config file {:?} not found, using defaults", config_path.as_ref());
        }

        config.apply_environment_overrides();

        info!(
            "Final link configuration: server_url={}, user={}, heartbeat={}ms, retries={}",
            config.server_url, config.user, config.heartbeat_interval_ms, config.max_retries
        );

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server_url) = lookup("LINK_SERVER_URL") {
            self.server_url = server_url;
            info!("Server URL overridden by environment: {}", self.server_url);
        }

        if let Some(user) = lookup("LINK_USER") {
            self.user = user;
            info!("User overridden by environment: {}", self.user);
        }

        if let Some(ms) = parse_var(&lookup, "LINK_HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval_ms = ms;
            info!("Heartbeat interval overridden by environment: {}ms", ms);
        }

        if let Some(ms) = parse_var(&lookup, "LINK_LOGIN_TIMEOUT_MS") {
            self.login_timeout_ms = ms;
            info!("Login timeout overridden by environment: {}ms", ms);
        }

        if let Some(retries) = parse_var(&lookup, "LINK_MAX_RETRIES") {
            self.max_retries = retries;
            info!("Max retries overridden by environment: {}", retries);
        }

        if let Some(ms) = parse_var(&lookup, "LINK_RETRY_BASE_INTERVAL_MS") {
            self.retry_base_interval_ms = ms;
            info!("Retry base interval overridden by environment: {}ms", ms);
        }
    }

    /// Session settings derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            deadline_multiplier: self.deadline_multiplier,
            deadline_poll_interval: Duration::from_millis(self.deadline_poll_interval_ms),
            login_timeout: Duration::from_millis(self.login_timeout_ms),
            retry: RetryPolicy::new(
                self.max_retries,
                Duration::from_millis(self.retry_base_interval_ms),
            ),
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring unparsable {}={}", key, value);
            None
        }
    }
}
