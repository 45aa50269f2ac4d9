//! Transport seam between the feed connection and the network.

use crate::error::ConnectorError;
use async_trait::async_trait;

/// One inbound websocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame with its reason, if any.
    Close(Option<String>),
}

/// Writer and reader halves of an established transport.
pub type TransportPair = (Box<dyn FrameWriter>, Box<dyn FrameReader>);

/// Opens transports. One call per connection attempt.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportPair, ConnectorError>;
}

#[async_trait]
pub trait FrameWriter: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError>;

    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), ConnectorError>;

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), ConnectorError>;

    /// Close the transport. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

#[async_trait]
pub trait FrameReader: Send {
    /// Next inbound frame, or `None` once the peer has gone away.
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectorError>>;
}
