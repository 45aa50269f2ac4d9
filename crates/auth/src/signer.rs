//! HMAC-SHA256 signing for Coinbase Advanced Trade requests and subscriptions.

use crate::credentials::ApiCredentials;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature.
pub const HEADER_ACCESS_SIGN: &str = "CB-ACCESS-SIGN";
/// Header carrying the unix-seconds timestamp that was signed.
pub const HEADER_ACCESS_TIMESTAMP: &str = "CB-ACCESS-TIMESTAMP";
/// Header carrying the public API key.
pub const HEADER_ACCESS_KEY: &str = "CB-ACCESS-KEY";

/// The three authentication fields attached to a REST request or a feed
/// subscribe frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub signature: String,
    pub timestamp: String,
    pub api_key: String,
}

impl AuthHeaders {
    /// Header name/value pairs in the order the exchange documents them.
    pub fn as_header_pairs(&self) -> [(&'static str, &str); 3] {
        [
            (HEADER_ACCESS_SIGN, self.signature.as_str()),
            (HEADER_ACCESS_TIMESTAMP, self.timestamp.as_str()),
            (HEADER_ACCESS_KEY, self.api_key.as_str()),
        ]
    }
}

/// Sign `message` with `secret` and bundle the result with the timestamp and key.
///
/// The caller is responsible for building `message` exactly as the exchange
/// expects; this function only computes the lowercase hex HMAC-SHA256.
pub fn sign(timestamp: &str, message: &str, api_key: &str, secret: &str) -> AuthHeaders {
    AuthHeaders {
        signature: hmac_hex(secret, message),
        timestamp: timestamp.to_string(),
        api_key: api_key.to_string(),
    }
}

/// Current unix time in whole seconds, as the exchange expects it.
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn hmac_hex(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");

    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Request signer bound to a set of credentials.
pub struct RequestSigner<'a> {
    credentials: &'a ApiCredentials,
}

impl<'a> RequestSigner<'a> {
    /// Create a new request signer with the given credentials.
    pub fn new(credentials: &'a ApiCredentials) -> Self {
        Self { credentials }
    }

    /// Sign an already-assembled message.
    pub fn sign(&self, timestamp: &str, message: &str) -> AuthHeaders {
        sign(
            timestamp,
            message,
            self.credentials.api_key(),
            self.credentials.expose_secret(),
        )
    }

    /// Auth headers for a REST call.
    ///
    /// Message layout: `timestamp + METHOD + path_with_query + body`.
    /// `path` must be the request path as seen by the server, including the
    /// API prefix and any query string.
    pub fn rest_headers(&self, timestamp: &str, method: &str, path: &str, body: &str) -> AuthHeaders {
        let message = format!("{}{}{}{}", timestamp, method, path, body);
        self.sign(timestamp, &message)
    }

    /// Auth fields for a feed subscribe frame.
    ///
    /// Message layout: `timestamp + channel + product_ids.join(",")`.
    pub fn subscription_auth(
        &self,
        timestamp: &str,
        channel: &str,
        product_ids: &[String],
    ) -> AuthHeaders {
        let message = format!("{}{}{}", timestamp, channel, product_ids.join(","));
        self.sign(timestamp, &message)
    }
}
