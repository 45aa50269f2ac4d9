//! Scripted in-memory transport for driving `FeedConnection` in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::ApiCredentials;
use common::BackoffConfig;
use connector_core::{
    ConnectorConfig, ConnectorError, FeedTransport, Frame, FrameReader, FrameWriter, TransportPair,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const CLOCK_START: u64 = 1_700_000_000;

pub type FrameFeed = mpsc::UnboundedSender<Result<Frame, ConnectorError>>;

/// Everything the connection wrote, across all sessions.
#[derive(Debug, Default)]
pub struct Recorder {
    pub texts: Vec<String>,
    pub pings: usize,
    pub pongs: Vec<Vec<u8>>,
    pub closes: usize,
}

struct MockWriter {
    recorder: Arc<Mutex<Recorder>>,
    stall_pings: bool,
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError> {
        self.recorder.lock().texts.push(text);
        Ok(())
    }

    async fn send_ping(&mut self, _payload: Vec<u8>) -> Result<(), ConnectorError> {
        if self.stall_pings {
            // A peer that stopped reading: the write never completes.
            std::future::pending::<()>().await;
        }
        self.recorder.lock().pings += 1;
        Ok(())
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), ConnectorError> {
        self.recorder.lock().pongs.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.recorder.lock().closes += 1;
        Ok(())
    }
}

struct MockReader {
    frames: mpsc::UnboundedReceiver<Result<Frame, ConnectorError>>,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectorError>> {
        // Blocks until the test pushes a frame or drops its sender.
        self.frames.recv().await
    }
}

/// Hands out one queued session per `connect` call and refuses once the
/// queue is empty.
#[derive(Default)]
pub struct MockTransport {
    sessions: Mutex<VecDeque<MockReader>>,
    pub recorder: Arc<Mutex<Recorder>>,
    connects: AtomicUsize,
    stall_pings: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport whose writers never finish sending a ping.
    pub fn with_stalled_pings() -> Arc<Self> {
        let transport = Self::default();
        transport.stall_pings.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    /// Queue a session; frames pushed into the returned sender are read by it.
    pub fn add_session(&self) -> FrameFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push_back(MockReader { frames: rx });
        tx
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.recorder.lock().texts.clone()
    }

    pub fn pings(&self) -> usize {
        self.recorder.lock().pings
    }

    pub fn closes(&self) -> usize {
        self.recorder.lock().closes
    }
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn connect(&self, _url: &str) -> Result<TransportPair, ConnectorError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let reader = self
            .sessions
            .lock()
            .pop_front()
            .ok_or_else(|| ConnectorError::Connect("connection refused".to_string()))?;

        let writer = MockWriter {
            recorder: Arc::clone(&self.recorder),
            stall_pings: self.stall_pings.load(Ordering::SeqCst),
        };
        Ok((Box::new(writer), Box::new(reader)))
    }
}

pub fn credentials() -> ApiCredentials {
    ApiCredentials::new("test-key".to_string(), "test-secret".to_string())
}

pub fn config(products: &[&str]) -> ConnectorConfig {
    ConnectorConfig {
        url: "wss://feed.test".to_string(),
        channel: "level2".to_string(),
        products: products.iter().map(|p| p.to_string()).collect(),
        keepalive_interval: Duration::from_secs(60),
        reconnect: BackoffConfig::Constant(Duration::from_millis(10)),
        ..ConnectorConfig::default()
    }
}

/// Returns 1700000000, 1700000001, ... on successive calls.
pub fn counting_clock() -> impl Fn() -> String + Send + Sync + 'static {
    let next = AtomicU64::new(CLOCK_START);
    move || next.fetch_add(1, Ordering::SeqCst).to_string()
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn text(json: &str) -> Result<Frame, ConnectorError> {
    Ok(Frame::Text(json.to_string()))
}

pub fn subscriptions_frame(products: &[&str]) -> String {
    serde_json::json!({
        "channel": "subscriptions",
        "sequence_num": 0,
        "events": [{"subscriptions": {"level2": products}}]
    })
    .to_string()
}

/// Level2 frame with one book event. Levels are `(side, price, quantity)`.
pub fn book_frame(kind: &str, product: &str, sequence: u64, levels: &[(&str, &str, &str)]) -> String {
    let updates: Vec<serde_json::Value> = levels
        .iter()
        .map(|(side, price, qty)| {
            serde_json::json!({
                "side": side,
                "event_time": "2024-01-01T00:00:00Z",
                "price_level": price,
                "new_quantity": qty
            })
        })
        .collect();

    serde_json::json!({
        "channel": "l2_data",
        "timestamp": "2024-01-01T00:00:00.000Z",
        "sequence_num": sequence,
        "events": [{"type": kind, "product_id": product, "updates": updates}]
    })
    .to_string()
}
