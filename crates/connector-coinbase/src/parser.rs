//! Decoding of inbound Advanced Trade feed frames.

use connector_core::ConnectorError;
use model::{FeedEvent, FeedMessage, LevelUpdate, PriceLevel, Side};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const HEARTBEATS_CHANNEL: &str = "heartbeats";

/// Envelope shared by every frame.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    channel: Option<String>,
    timestamp: Option<String>,
    sequence_num: Option<u64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    #[serde(default)]
    events: Vec<Value>,
}

/// One product's book event inside `events`.
#[derive(Debug, Deserialize)]
struct RawBookEvent {
    #[serde(rename = "type")]
    kind: String,
    product_id: String,
    #[serde(default)]
    updates: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    side: Side,
    price_level: Decimal,
    new_quantity: Decimal,
}

impl From<RawLevel> for LevelUpdate {
    fn from(raw: RawLevel) -> Self {
        LevelUpdate::new(raw.side, raw.price_level, raw.new_quantity)
    }
}

/// Decode one text frame into a `FeedMessage`.
///
/// Each call builds fresh values; nothing is shared with earlier frames.
///
/// # Errors
/// - `ConnectorError::Rejected` for an upstream `{"type": "error"}` frame.
/// - `ConnectorError::Decode` for invalid JSON or a malformed book event. The
///   whole frame is rejected so no partial batch reaches a book.
pub fn decode_frame(text: &str) -> Result<FeedMessage, ConnectorError> {
    let envelope: RawEnvelope =
        serde_json::from_str(text).map_err(|e| ConnectorError::Decode(e.to_string()))?;

    if envelope.kind.as_deref() == Some("error") {
        return Err(ConnectorError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "unspecified error".to_string()),
        ));
    }

    let heartbeat_channel = envelope.channel.as_deref() == Some(HEARTBEATS_CHANNEL);
    let mut events = Vec::with_capacity(envelope.events.len());

    for raw in envelope.events {
        if let Some(event) = decode_event(raw, heartbeat_channel)? {
            events.push(event);
        }
    }

    Ok(FeedMessage {
        channel: envelope.channel,
        timestamp: envelope.timestamp,
        sequence_num: envelope.sequence_num,
        events,
    })
}

fn decode_event(raw: Value, heartbeat_channel: bool) -> Result<Option<FeedEvent>, ConnectorError> {
    if let Some(subscriptions) = raw.get("subscriptions") {
        return Ok(Some(FeedEvent::Subscription {
            subscriptions: subscriptions.clone(),
        }));
    }

    if heartbeat_channel || raw.get("heartbeat_counter").is_some() {
        return Ok(Some(FeedEvent::Heartbeat));
    }

    if raw.get("product_id").is_none() || raw.get("updates").is_none() {
        debug!(event = %raw, "Skipping event without book data");
        return Ok(None);
    }

    let book: RawBookEvent =
        serde_json::from_value(raw).map_err(|e| ConnectorError::Decode(e.to_string()))?;

    let event = match book.kind.as_str() {
        "snapshot" => FeedEvent::Snapshot {
            instrument: book.product_id,
            levels: book
                .updates
                .into_iter()
                .map(|level| PriceLevel::from(LevelUpdate::from(level)))
                .collect(),
        },
        "update" => FeedEvent::Update {
            instrument: book.product_id,
            changes: book.updates.into_iter().map(LevelUpdate::from).collect(),
        },
        other => {
            debug!(kind = %other, product = %book.product_id, "Skipping unknown book event type");
            return Ok(None);
        }
    };

    Ok(Some(event))
}
