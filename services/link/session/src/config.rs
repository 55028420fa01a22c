//! Session configuration and endpoint addressing.

use crate::error::LinkError;
use crate::retry::RetryPolicy;
use std::time::Duration;
use url::Url;

/// Configuration for a link session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval between liveness probes
    pub heartbeat_interval: Duration,
    /// Read deadline as a multiple of the heartbeat interval
    pub deadline_multiplier: u32,
    /// How often the read deadline is checked
    pub deadline_poll_interval: Duration,
    /// Timeout for a single login attempt
    pub login_timeout: Duration,
    /// Backoff policy for reconnection
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            deadline_multiplier: 3,
            deadline_poll_interval: Duration::from_secs(1),
            login_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Maximum tolerated silence before the link is declared dead
    pub fn read_deadline(&self) -> Duration {
        self.heartbeat_interval.saturating_mul(self.deadline_multiplier)
    }

    /// Reject tunables the liveness loops cannot run with
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.heartbeat_interval.is_zero() {
            return Err(LinkError::InvalidConfig("heartbeat_interval must be non-zero".to_string()));
        }
        if self.deadline_poll_interval.is_zero() {
            return Err(LinkError::InvalidConfig(
                "deadline_poll_interval must be non-zero".to_string(),
            ));
        }
        if self.deadline_multiplier == 0 {
            return Err(LinkError::InvalidConfig("deadline_multiplier must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Connection target: base URL plus the identity sent as `user`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    base_url: Url,
    identity: String,
}

impl Endpoint {
    /// Create an endpoint, validating the base URL
    pub fn new(base_url: &str, identity: impl Into<String>) -> Result<Self, LinkError> {
        let base_url =
            Url::parse(base_url).map_err(|e| LinkError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            base_url,
            identity: identity.into(),
        })
    }

    /// Identity carried in the connection URL
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Effective connection URL, `base?user=<identity>`
    pub fn url(&self) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("user", &self.identity);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.read_deadline(), Duration::from_secs(30));
        assert_eq!(config.deadline_poll_interval, Duration::from_secs(1));
        assert_eq!(config.login_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        assert!(SessionConfig::default().validate().is_ok());

        let config = SessionConfig {
            heartbeat_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));

        let config = SessionConfig {
            deadline_poll_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));

        let config = SessionConfig {
            deadline_multiplier: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(LinkError::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint::new("ws://127.0.0.1:8080/ws", "alice").unwrap();
        assert_eq!(endpoint.url(), "ws://127.0.0.1:8080/ws?user=alice");
        assert_eq!(endpoint.identity(), "alice");
    }

    #[test]
    fn test_endpoint_url_encodes_identity_and_keeps_query() {
        let endpoint = Endpoint::new("ws://example.com/ws?room=1", "bob smith&co").unwrap();
        assert_eq!(endpoint.url(), "ws://example.com/ws?room=1&user=bob+smith%26co");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            Endpoint::new("not a url", "alice"),
            Err(LinkError::InvalidEndpoint(_))
        ));
    }
}
