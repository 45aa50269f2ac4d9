//! Coinbase Advanced Trade REST client.

use crate::error::CoinbaseRestError;
use crate::orders::CreateOrderRequest;
use auth::{current_timestamp, ApiCredentials, AuthHeaders, RequestSigner};
use common::DEFAULT_REST_URL;
use rest_client::{Method, RestClient};
use serde_json::{json, Value};
use std::time::Duration;
use url::form_urlencoded;

/// Request timeout for Coinbase API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size for `get_market_trades`.
pub const DEFAULT_TRADES_LIMIT: u32 = 10_000;

/// A signed request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// Encoded query string, without the leading '?'.
    pub query: Option<String>,
    /// Exact body string that was signed.
    pub body: Option<String>,
    /// Full request path that was signed, including the API prefix and query.
    pub signed_path: String,
    pub auth: AuthHeaders,
}

/// Coinbase REST API client with request signing.
pub struct CoinbaseRestClient {
    client: RestClient,
    credentials: ApiCredentials,
}

impl CoinbaseRestClient {
    /// Create a client for the production endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: ApiCredentials) -> Result<Self, CoinbaseRestError> {
        Self::with_base_url(credentials, DEFAULT_REST_URL)
    }

    /// Create a client for a specific base URL, including its API prefix
    /// (e.g. `https://api.coinbase.com/api/v3/brokerage`).
    pub fn with_base_url(
        credentials: ApiCredentials,
        base_url: &str,
    ) -> Result<Self, CoinbaseRestError> {
        let client = RestClient::new(base_url, REQUEST_TIMEOUT)?;
        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Get the API key (for logging/debugging).
    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    /// Encode the query and body and sign the request with `timestamp`.
    pub fn prepare(
        &self,
        method: &Method,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        timestamp: &str,
    ) -> Result<PreparedRequest, CoinbaseRestError> {
        let query = encode_query(params);
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CoinbaseRestError::Serialize(e.to_string()))?;

        let mut signed_path = format!("{}{}", self.client.base_path(), endpoint);
        if let Some(q) = &query {
            signed_path.push('?');
            signed_path.push_str(q);
        }

        let signer = RequestSigner::new(&self.credentials);
        let auth = signer.rest_headers(
            timestamp,
            method.as_str(),
            &signed_path,
            body.as_deref().unwrap_or(""),
        );

        Ok(PreparedRequest {
            query,
            body,
            signed_path,
            auth,
        })
    }

    /// Send a signed request and return the JSON response.
    ///
    /// Non-2xx responses and transport failures surface as
    /// `CoinbaseRestError::Rest`; nothing is retried.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, CoinbaseRestError> {
        let prepared = self.prepare(&method, endpoint, params, body, &current_timestamp())?;
        let headers = prepared.auth.as_header_pairs();

        let response = self
            .client
            .send(
                method,
                endpoint,
                prepared.query.as_deref(),
                prepared.body,
                &headers,
            )
            .await?;

        Ok(response)
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// GET /accounts
    pub async fn list_accounts(&self) -> Result<Value, CoinbaseRestError> {
        self.send(Method::GET, "/accounts", &[], None).await
    }

    /// GET /accounts/{account_id}
    pub async fn get_account(&self, account_id: &str) -> Result<Value, CoinbaseRestError> {
        self.send(Method::GET, &format!("/accounts/{}", account_id), &[], None)
            .await
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// POST /orders
    ///
    /// The order configuration is sent as given; the exchange validates it.
    pub async fn create_order(
        &self,
        order: &CreateOrderRequest,
    ) -> Result<Value, CoinbaseRestError> {
        let body =
            serde_json::to_value(order).map_err(|e| CoinbaseRestError::Serialize(e.to_string()))?;

        tracing::info!(
            product = %order.product_id,
            side = %order.side,
            client_order_id = %order.client_order_id,
            "Placing order"
        );

        self.send(Method::POST, "/orders", &[], Some(&body)).await
    }

    /// POST /orders/batch_cancel
    pub async fn cancel_orders(&self, order_ids: &[String]) -> Result<Value, CoinbaseRestError> {
        let body = json!({ "order_ids": order_ids });

        tracing::info!(count = order_ids.len(), "Canceling orders");

        self.send(Method::POST, "/orders/batch_cancel", &[], Some(&body))
            .await
    }

    /// GET /orders/historical/batch
    pub async fn list_orders(&self) -> Result<Value, CoinbaseRestError> {
        self.send(Method::GET, "/orders/historical/batch", &[], None)
            .await
    }

    /// GET /orders/historical/{order_id}
    pub async fn get_order(&self, order_id: &str) -> Result<Value, CoinbaseRestError> {
        self.send(
            Method::GET,
            &format!("/orders/historical/{}", order_id),
            &[],
            None,
        )
        .await
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// GET /products/{product_id}
    pub async fn get_product(&self, product_id: &str) -> Result<Value, CoinbaseRestError> {
        self.send(Method::GET, &format!("/products/{}", product_id), &[], None)
            .await
    }

    /// GET /products/{product_id}/candles
    ///
    /// `start` and `end` are unix seconds; `granularity` is the exchange's
    /// enum name (e.g. `ONE_MINUTE`).
    pub async fn get_product_candles(
        &self,
        product_id: &str,
        start: &str,
        end: &str,
        granularity: &str,
    ) -> Result<Value, CoinbaseRestError> {
        let params = [("start", start), ("end", end), ("granularity", granularity)];
        self.send(
            Method::GET,
            &format!("/products/{}/candles", product_id),
            &params,
            None,
        )
        .await
    }

    /// GET /products/{product_id}/trades
    ///
    /// `limit` defaults to `DEFAULT_TRADES_LIMIT`.
    pub async fn get_market_trades(
        &self,
        product_id: &str,
        limit: Option<u32>,
    ) -> Result<Value, CoinbaseRestError> {
        let limit = trades_limit(limit);
        self.send(
            Method::GET,
            &format!("/products/{}/trades", product_id),
            &[("limit", &limit)],
            None,
        )
        .await
    }

    // ========================================================================
    // Fees
    // ========================================================================

    /// GET /transactions_summary
    pub async fn get_transactions_summary(
        &self,
        start_date: &str,
        end_date: &str,
        user_native_currency: &str,
    ) -> Result<Value, CoinbaseRestError> {
        let params = [
            ("start_date", start_date),
            ("end_date", end_date),
            ("user_native_currency", user_native_currency),
        ];
        self.send(Method::GET, "/transactions_summary", &params, None)
            .await
    }
}

fn trades_limit(limit: Option<u32>) -> String {
    limit.unwrap_or(DEFAULT_TRADES_LIMIT).to_string()
}

impl std::fmt::Debug for CoinbaseRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseRestClient")
            .field("base_url", &self.client.base_url())
            .field("api_key", &self.credentials.api_key())
            .finish()
    }
}

/// URL-encode query parameters in the given order.
fn encode_query(params: &[(&str, &str)]) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    Some(serializer.finish())
}
