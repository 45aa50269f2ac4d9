//! Endpoint and feed settings.
//!
//! Defaults target the production Advanced Trade endpoints and can be
//! overridden through environment variables (or a `.env` file).

use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffConfig;

pub const DEFAULT_WS_URL: &str = "wss://advanced-trade-ws.coinbase.com";
pub const DEFAULT_REST_URL: &str = "https://api.coinbase.com/api/v3/brokerage";
pub const DEFAULT_CHANNEL: &str = "level2";
pub const DEFAULT_PRODUCT: &str = "BTC-USD";
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

const WS_URL_VAR: &str = "COINBASE_WS_URL";
const REST_URL_VAR: &str = "COINBASE_REST_URL";
const CHANNEL_VAR: &str = "COINBASE_CHANNEL";
const PRODUCTS_VAR: &str = "COINBASE_PRODUCTS";
const KEEPALIVE_VAR: &str = "COINBASE_KEEPALIVE_SECS";
const RECONNECT_VAR: &str = "COINBASE_RECONNECT";

/// Runtime settings for the feed and REST clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Websocket feed URL.
    pub ws_url: String,
    /// REST base URL including the API prefix.
    pub rest_url: String,
    /// Feed channel to subscribe to.
    pub channel: String,
    /// Product ids to subscribe to.
    pub products: Vec<String>,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
    /// Reconnect delay policy.
    pub reconnect: BackoffConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            products: vec![DEFAULT_PRODUCT.to_string()],
            keepalive_interval: DEFAULT_KEEPALIVE,
            reconnect: BackoffConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup, falling back to defaults
    /// for keys that are absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(url) = lookup(WS_URL_VAR) {
            settings.ws_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup(REST_URL_VAR) {
            settings.rest_url = url.trim_end_matches('/').to_string();
        }
        if let Some(channel) = lookup(CHANNEL_VAR) {
            settings.channel = channel.trim().to_string();
        }
        if let Some(products) = lookup(PRODUCTS_VAR) {
            settings.products = parse_products(&products);
        }
        if let Some(secs) = lookup(KEEPALIVE_VAR) {
            let secs: u64 = secs.trim().parse().map_err(|_| SettingsError {
                key: KEEPALIVE_VAR,
                value: secs.clone(),
            })?;
            settings.keepalive_interval = Duration::from_secs(secs);
        }
        if let Some(policy) = lookup(RECONNECT_VAR) {
            settings.reconnect = policy.parse().map_err(|_| SettingsError {
                key: RECONNECT_VAR,
                value: policy.clone(),
            })?;
        }

        Ok(settings)
    }
}

/// Split a comma separated product list, dropping blanks and duplicates.
fn parse_products(raw: &str) -> Vec<String> {
    let mut products: Vec<String> = Vec::new();
    for product in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if !products.iter().any(|p| p == product) {
            products.push(product.to_string());
        }
    }
    products
}

/// A settings variable held a value that could not be parsed.
#[derive(Debug, Clone)]
pub struct SettingsError {
    key: &'static str,
    value: String,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value '{}' for {}", self.value, self.key)
    }
}

impl std::error::Error for SettingsError {}
