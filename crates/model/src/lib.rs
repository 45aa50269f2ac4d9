use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Book side. On the wire the ask side is called `offer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "bid")]
    Bid,
    #[serde(rename = "offer", alias = "ask")]
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// A resting price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: Side,
}

impl PriceLevel {
    pub fn new(side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            price,
            quantity,
            side,
        }
    }

    /// Returns the notional value (price * quantity) at this level.
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// One incremental change: the new total quantity resting at a price.
/// A zero quantity removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub side: Side,
    pub price: Decimal,
    pub new_quantity: Decimal,
}

impl LevelUpdate {
    pub fn new(side: Side, price: Decimal, new_quantity: Decimal) -> Self {
        Self {
            side,
            price,
            new_quantity,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.new_quantity.is_zero()
    }
}

impl From<LevelUpdate> for PriceLevel {
    fn from(update: LevelUpdate) -> Self {
        PriceLevel::new(update.side, update.price, update.new_quantity)
    }
}

/// A decoded feed event. Built once per frame and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full book for one product.
    Snapshot {
        instrument: String,
        levels: Vec<PriceLevel>,
    },
    /// Incremental changes for one product, in upstream order.
    Update {
        instrument: String,
        changes: Vec<LevelUpdate>,
    },
    /// Subscription acknowledgement, carrying the upstream subscription map.
    Subscription { subscriptions: serde_json::Value },
    /// Heartbeat event.
    Heartbeat,
}

impl FeedEvent {
    /// Product the event applies to, if it carries book data.
    pub fn instrument(&self) -> Option<&str> {
        match self {
            FeedEvent::Snapshot { instrument, .. } | FeedEvent::Update { instrument, .. } => {
                Some(instrument)
            }
            FeedEvent::Subscription { .. } | FeedEvent::Heartbeat => None,
        }
    }

    /// Whether the event carries book data.
    pub fn is_book_event(&self) -> bool {
        self.instrument().is_some()
    }
}

/// One decoded inbound frame: envelope metadata plus its events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedMessage {
    pub channel: Option<String>,
    pub timestamp: Option<String>,
    pub sequence_num: Option<u64>,
    pub events: Vec<FeedEvent>,
}
