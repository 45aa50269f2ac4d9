//! Shared pieces of a market data connector: errors, configuration,
//! connection state, lifecycle events, the transport seam, and the raw
//! frame log.

mod config;
mod error;
mod frame_log;
mod lifecycle;
mod state;
mod transport;

pub use config::{ConnectorConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT};
pub use error::ConnectorError;
pub use frame_log::{FrameLog, JsonLinesFrameLog};
pub use lifecycle::ConnectionEvent;
pub use state::ConnectionState;
pub use transport::{FeedTransport, Frame, FrameReader, FrameWriter, TransportPair};

use model::FeedMessage;
use tokio::sync::mpsc;

pub type MessageSender = mpsc::Sender<FeedMessage>;
pub type MessageReceiver = mpsc::Receiver<FeedMessage>;

pub fn create_message_channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    mpsc::channel(capacity)
}
