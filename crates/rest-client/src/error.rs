//! REST client error types.

use thiserror::Error;

/// Errors from a REST call. None of them are retried by the client.
#[derive(Debug, Error)]
pub enum RestError {
    /// Non-2xx response with its status and body.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    /// Network failure before a response arrived.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Response body was not valid JSON, or not the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(String),

    /// HTTP 429.
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Invalid base URL or HTTP client setup failure.
    #[error("Request build error: {0}")]
    RequestBuild(String),
}

impl RestError {
    /// Whether a caller could reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Timeout | RestError::Connection(_) | RestError::RateLimited { .. } => true,
            RestError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RestError::RateLimited { .. })
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::HttpError { status, .. } => Some(*status),
            RestError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RestError::Timeout
        } else if err.is_decode() {
            RestError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            RestError::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RestError::Connection(err.to_string())
        }
    }
}
