//! Outbound subscribe frame.

use auth::{ApiCredentials, RequestSigner};
use connector_core::ConnectorError;
use serde::Serialize;

/// `{"type": "subscribe", channel, product_ids, signature, api_key, timestamp}`.
///
/// The signature covers `timestamp + channel + product_ids.join(",")`, so a
/// request is built fresh for every connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: String,
    pub product_ids: Vec<String>,
    pub signature: String,
    pub api_key: String,
    pub timestamp: String,
}

impl SubscribeRequest {
    pub fn signed(
        credentials: &ApiCredentials,
        channel: &str,
        product_ids: &[String],
        timestamp: &str,
    ) -> Self {
        let auth = RequestSigner::new(credentials).subscription_auth(timestamp, channel, product_ids);

        Self {
            kind: "subscribe".to_string(),
            channel: channel.to_string(),
            product_ids: product_ids.to_vec(),
            signature: auth.signature,
            api_key: auth.api_key,
            timestamp: auth.timestamp,
        }
    }

    pub fn to_json(&self) -> Result<String, ConnectorError> {
        serde_json::to_string(self).map_err(|e| ConnectorError::Config(e.to_string()))
    }
}
