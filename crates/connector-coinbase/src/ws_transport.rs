//! Websocket transport over tokio-tungstenite.

use async_trait::async_trait;
use connector_core::{
    ConnectorError, FeedTransport, Frame, FrameReader, FrameWriter, TransportPair,
    DEFAULT_CONNECT_TIMEOUT,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens TLS websocket connections.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<TransportPair, ConnectorError> {
        let stream = match tokio::time::timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(ConnectorError::Connect(e.to_string())),
            Err(_) => return Err(ConnectorError::Connect("connection timeout".to_string())),
        };

        let (sink, stream) = stream.split();
        Ok((
            Box::new(WsWriter { sink, closed: false }),
            Box::new(WsReader { stream }),
        ))
    }
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

impl WsWriter {
    async fn send(&mut self, message: Message) -> Result<(), ConnectorError> {
        self.sink
            .send(message)
            .await
            .map_err(|e| ConnectorError::Transport(e.to_string()))
    }
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError> {
        self.send(Message::Text(text.into())).await
    }

    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), ConnectorError> {
        self.send(Message::Ping(payload.into())).await
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), ConnectorError> {
        self.send(Message::Pong(payload.into())).await
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink
            .close()
            .await
            .map_err(|e| ConnectorError::Transport(e.to_string()))
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectorError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(ConnectorError::Transport(e.to_string()))),
            };

            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(data) => Frame::Binary(data.to_vec()),
                Message::Ping(data) => Frame::Ping(data.to_vec()),
                Message::Pong(data) => Frame::Pong(data.to_vec()),
                Message::Close(close) => Frame::Close(close.map(|c| c.reason.as_str().to_owned())),
                // Raw frames are only produced when writing.
                Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }
}
