//! Authentication and signing for the Coinbase Advanced Trade API.
//!
//! Both the REST client and the websocket feed authenticate with the same
//! scheme: an HMAC-SHA256 signature over a timestamped message, keyed with the
//! API secret.
//!
//! # Features
//!
//! - **Secure Credentials**: API secrets are wrapped in `SecretString` to prevent
//!   accidental logging and ensure memory is zeroed on drop.
//! - **Signing**: `sign` is a pure function returning the three auth fields
//!   (`CB-ACCESS-SIGN`, `CB-ACCESS-TIMESTAMP`, `CB-ACCESS-KEY`).
//! - **Environment Loading**: Credentials can be loaded from environment variables
//!   or a `.env` file.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::{ApiCredentials, RequestSigner};
//!
//! let credentials = ApiCredentials::from_env()?;
//! let signer = RequestSigner::new(&credentials);
//!
//! // REST: timestamp + method + path + body
//! let headers = signer.rest_headers("1700000000", "GET", "/api/v3/brokerage/accounts", "");
//!
//! // Feed: timestamp + channel + comma-joined product ids
//! let auth = signer.subscription_auth("1700000000", "level2", &["BTC-USD".into()]);
//! ```

mod credentials;
mod error;
mod signer;

pub use credentials::ApiCredentials;
pub use error::AuthError;
pub use signer::{
    current_timestamp, sign, AuthHeaders, RequestSigner, HEADER_ACCESS_KEY, HEADER_ACCESS_SIGN,
    HEADER_ACCESS_TIMESTAMP,
};
