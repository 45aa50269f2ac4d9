//! Coinbase Advanced Trade REST API client.
//!
//! Every request is signed with HMAC-SHA256 over
//! `timestamp + METHOD + request path (with query) + body` and carries the
//! `CB-ACCESS-*` headers. Responses are returned as raw JSON values; order
//! payloads are passed through without validation.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::ApiCredentials;
//! use coinbase_rest::CoinbaseRestClient;
//!
//! let credentials = ApiCredentials::from_env()?;
//! let client = CoinbaseRestClient::new(credentials)?;
//!
//! let accounts = client.list_accounts().await?;
//! let candles = client
//!     .get_product_candles("BTC-USD", "1700000000", "1700003600", "ONE_MINUTE")
//!     .await?;
//! ```

mod client;
mod error;
mod orders;

pub use client::{CoinbaseRestClient, PreparedRequest, DEFAULT_TRADES_LIMIT};
pub use error::CoinbaseRestError;
pub use orders::{CreateOrderRequest, OrderSide};
pub use rest_client::Method;
