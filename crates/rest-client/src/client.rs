//! Generic REST client wrapper around reqwest.

use crate::error::RestError;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait suggested when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

/// Generic REST client for making HTTP requests.
pub struct RestClient {
    client: Client,
    base_url: String,
    base_path: String,
}

impl RestClient {
    /// Create a new REST client with the given base URL.
    ///
    /// The base URL may carry a path prefix (e.g. `/api/v3/brokerage`); it is
    /// kept so callers can sign the full request path.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed =
            Url::parse(&base_url).map_err(|e| RestError::RequestBuild(e.to_string()))?;
        let base_path = parsed.path().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::RequestBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            base_path,
        })
    }

    /// Create a new REST client with default timeout.
    pub fn with_default_timeout(base_url: &str) -> Result<Self, RestError> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path component of the base URL, without a trailing slash.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Send a request and return the response body as JSON.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Request path relative to the base URL (e.g. "/accounts")
    /// * `query` - Optional encoded query string (without leading '?')
    /// * `body` - Optional body, sent verbatim as `application/json`
    /// * `headers` - Additional headers, e.g. authentication
    ///
    /// A successful response with an empty body yields `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<String>,
        headers: &[(&str, &str)],
    ) -> Result<Value, RestError> {
        let url = self.build_url(path, query);
        tracing::debug!(method = %method, url = %url, "REST request");

        let mut request = self.client.request(method, &url);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Send a GET request and deserialize the response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let value = self.send(Method::GET, path, query, None, headers).await?;
        serde_json::from_value(value).map_err(|e| RestError::Parse(e.to_string()))
    }

    /// Build a full URL from path and optional query string.
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Handle HTTP response and parse the JSON body.
    async fn handle_response(&self, response: Response) -> Result<Value, RestError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body).map_err(|e| {
                tracing::warn!(status = status.as_u16(), error = %e, "Failed to parse response");
                RestError::Parse(e.to_string())
            })
        } else {
            if status.as_u16() == 429 {
                let retry_after_ms = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after_ms)
                    .unwrap_or(DEFAULT_RETRY_AFTER_MS);
                return Err(RestError::RateLimited { retry_after_ms });
            }

            let body = response.text().await.unwrap_or_default();
            Err(RestError::HttpError {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

/// `Retry-After` in its delta-seconds form.
fn parse_retry_after_ms(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs * 1000)
}
