//! Coinbase REST API error types.

use auth::AuthError;
use rest_client::RestError;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when interacting with the Coinbase REST API.
#[derive(Debug, Error)]
pub enum CoinbaseRestError {
    /// REST client error: non-2xx status, network, timeout.
    #[error("REST client error: {0}")]
    Rest(#[from] RestError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A request body could not be encoded.
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Error body returned by the exchange on a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl CoinbaseRestError {
    /// HTTP status of the failed request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rest(rest) => rest.status(),
            _ => None,
        }
    }

    /// Structured error body of a non-2xx response.
    ///
    /// Coinbase answers failures with `{"error": "...", "message": "..."}`.
    pub fn api_error(&self) -> Option<ApiErrorBody> {
        match self {
            Self::Rest(RestError::HttpError { message, .. }) => serde_json::from_str(message).ok(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rest(rest) => rest.is_retryable(),
            _ => false,
        }
    }
}
