use crate::error::ConnectorError;
use common::{BackoffConfig, Settings};
use std::time::Duration;

/// Timeout for one transport handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the decoded message channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Duration of stable connection before resetting backoff.
const STABLE_CONNECTION_THRESHOLD: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    /// Websocket URL.
    pub url: String,
    /// Channel to subscribe to, e.g. `level2`.
    pub channel: String,
    /// Product ids, in the order they are signed and subscribed.
    pub products: Vec<String>,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
    /// Delay policy between teardown and the next connection attempt.
    pub reconnect: BackoffConfig,
    pub connect_timeout: Duration,
    /// A session that lasted this long resets the backoff.
    pub stable_connection_threshold: Duration,
    /// Channel buffer capacity.
    pub channel_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ConnectorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.ws_url.clone(),
            channel: settings.channel.clone(),
            products: settings.products.clone(),
            keepalive_interval: settings.keepalive_interval,
            reconnect: settings.reconnect.clone(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stable_connection_threshold: STABLE_CONNECTION_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Reject configurations that could never produce a working feed.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.url.trim().is_empty() {
            return Err(ConnectorError::Config("websocket url is empty".into()));
        }
        if self.channel.trim().is_empty() {
            return Err(ConnectorError::Config("channel is empty".into()));
        }
        if self.products.is_empty() {
            return Err(ConnectorError::Config("no products configured".into()));
        }
        if let Some(blank) = self.products.iter().position(|p| p.trim().is_empty()) {
            return Err(ConnectorError::Config(format!(
                "product at position {} is empty",
                blank
            )));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConnectorError::Config(
                "keepalive interval must be positive".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConnectorError::Config(
                "channel capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
