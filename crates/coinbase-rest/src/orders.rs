//! Order request payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Order side as the REST API names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Body of `POST /orders`.
///
/// `order_configuration` is forwarded as given, e.g.
/// `{"limit_limit_gtc": {"base_size": "0.01", "limit_price": "30000"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateOrderRequest {
    pub client_order_id: String,
    pub product_id: String,
    pub side: OrderSide,
    pub order_configuration: Value,
}

impl CreateOrderRequest {
    pub fn new(
        client_order_id: impl Into<String>,
        product_id: impl Into<String>,
        side: OrderSide,
        order_configuration: Value,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            product_id: product_id.into(),
            side,
            order_configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_order_body() {
        let order = CreateOrderRequest::new(
            "my-order-1",
            "BTC-USD",
            OrderSide::Buy,
            json!({"market_market_ioc": {"quote_size": "10"}}),
        );

        let body = serde_json::to_value(&order).unwrap();
        assert_eq!(
            body,
            json!({
                "client_order_id": "my-order-1",
                "product_id": "BTC-USD",
                "side": "BUY",
                "order_configuration": {"market_market_ioc": {"quote_size": "10"}}
            })
        );
    }

    #[test]
    fn test_order_side_display() {
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }
}
