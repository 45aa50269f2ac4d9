//! Generic REST client infrastructure.
//!
//! A thin wrapper around `reqwest` that:
//!
//! - sends a request with caller-supplied headers and an exact body string
//! - returns the response body as a JSON value
//! - maps non-2xx responses to `RestError::HttpError` and 429 to `RateLimited`
//!
//! Nothing is retried here.
//!
//! # Example
//!
//! ```rust,ignore
//! use rest_client::{Method, RestClient};
//!
//! let client = RestClient::with_default_timeout("https://api.coinbase.com/api/v3/brokerage")?;
//! let product = client
//!     .send(Method::GET, "/products/BTC-USD", None, None, &[])
//!     .await?;
//! ```

mod client;
mod error;

pub use client::RestClient;
pub use error::RestError;
pub use reqwest::Method;
