//! A single timed login attempt.

use crate::transport::{Connection, Connector};
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one connection attempt. Always resolved, never an error.
#[derive(Debug)]
pub enum AttemptResult {
    /// The transport opened in time
    Success(Connection),
    /// The timer elapsed before the transport opened
    Timeout,
    /// The transport reported an error before opening
    Failed(String),
}

/// Open a transport to `url`, racing it against `timeout`.
///
/// The losing branch is dropped: a late open is discarded along with its
/// connection, and the timer does not outlive a completed connect.
pub async fn attempt(connector: &dyn Connector, url: &str, timeout: Duration) -> AttemptResult {
    debug!("Opening link to {} (timeout {:?})", url, timeout);

    match tokio::time::timeout(timeout, connector.connect(url)).await {
        Ok(Ok(connection)) => {
            info!("Link to {} open", url);
            AttemptResult::Success(connection)
        }
        Ok(Err(e)) => {
            debug!("Link to {} failed: {}", url, e);
            AttemptResult::Failed(e.to_string())
        }
        Err(_) => {
            info!("Link to {} timed out after {:?}", url, timeout);
            AttemptResult::Timeout
        }
    }
}
