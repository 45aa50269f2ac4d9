//! Persistent, self-healing feed connection.
//!
//! One supervisor task owns the reader and runs
//! connect -> subscribe -> receive -> teardown -> delay until the owner calls
//! `close()`. Each session also runs a keepalive task that shares the writer.
//! `close()` does not wait for the next frame: the supervisor selects on the
//! shutdown signal with priority, drops the pending receive, and closes the
//! transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use auth::{current_timestamp, ApiCredentials};
use connector_core::{
    ConnectionEvent, ConnectionState, ConnectorConfig, ConnectorError, FeedTransport, Frame,
    FrameLog, FrameReader, FrameWriter, MessageSender,
};
use metrics::{create_metrics, SharedMetrics};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::parser::decode_frame;
use crate::subscribe::SubscribeRequest;
use crate::ws_transport::WsTransport;

/// Produces the unix-seconds timestamp signed into each subscribe frame.
pub type TimestampFn = Arc<dyn Fn() -> String + Send + Sync>;

const LIFECYCLE_CAPACITY: usize = 64;
const KEEPALIVE_PAYLOAD: &[u8] = b"keepalive";
/// Upper bound on flushing a close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on joining the keepalive task before it is aborted.
const KEEPALIVE_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn FrameWriter>>>;

/// State visible to both the owner and the supervisor task.
struct Shared {
    state: RwLock<ConnectionState>,
    last_error: RwLock<Option<ConnectorError>>,
    stopped: AtomicBool,
    lifecycle: broadcast::Sender<ConnectionEvent>,
}

impl Shared {
    /// Once closing has begun, only `Closed` may follow.
    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        let previous = *current;
        if previous == ConnectionState::Closing && state != ConnectionState::Closed {
            return;
        }
        *current = state;
        drop(current);

        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
            let _ = self.lifecycle.send(ConnectionEvent::StateChanged(state));
        }
    }

    /// Move to `Closing` unless the connection already reached `Closed`.
    fn begin_closing(&self) {
        let mut state = self.state.write();
        if !state.is_terminal() && *state != ConnectionState::Closing {
            *state = ConnectionState::Closing;
            drop(state);
            let _ = self
                .lifecycle
                .send(ConnectionEvent::StateChanged(ConnectionState::Closing));
        }
    }

    fn record_error(&self, error: ConnectorError) {
        *self.last_error.write() = Some(error.clone());
        let _ = self.lifecycle.send(ConnectionEvent::Error(error));
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.lifecycle.send(event);
    }
}

/// Everything a session needs, cloned into the supervisor task.
struct SessionContext {
    config: ConnectorConfig,
    credentials: ApiCredentials,
    transport: Arc<dyn FeedTransport>,
    clock: TimestampFn,
    metrics: SharedMetrics,
    frame_log: Option<Arc<dyn FrameLog>>,
    shared: Arc<Shared>,
}

/// An established, subscribed transport plus its keepalive task.
struct Session {
    writer: SharedWriter,
    reader: Box<dyn FrameReader>,
    keepalive_stop: watch::Sender<bool>,
    keepalive: JoinHandle<()>,
    connected_at: Instant,
}

impl Session {
    /// Stop and join the keepalive task, then close the transport.
    ///
    /// A stop cancels an in-flight ping, so the join is normally immediate.
    /// A keepalive task that does not finish in time is aborted.
    async fn teardown(mut self) {
        let _ = self.keepalive_stop.send(true);
        match tokio::time::timeout(KEEPALIVE_JOIN_TIMEOUT, &mut self.keepalive).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Keepalive task panicked"),
            Err(_) => {
                warn!("Keepalive task did not stop, aborting it");
                self.keepalive.abort();
            }
        }

        let writer = Arc::clone(&self.writer);
        let close = async move { writer.lock().await.close().await };
        match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Error closing transport"),
            Err(_) => debug!("Timed out closing transport"),
        }
        drop(self.reader);
    }
}

/// How a receive loop ended.
enum SessionEnd {
    Shutdown,
    ChannelClosed,
    Failed(ConnectorError),
}

/// Subscription to one channel for a fixed set of products, kept alive across
/// transport failures.
pub struct FeedConnection {
    config: ConnectorConfig,
    credentials: ApiCredentials,
    transport: Arc<dyn FeedTransport>,
    clock: TimestampFn,
    metrics: SharedMetrics,
    frame_log: Option<Arc<dyn FrameLog>>,
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedConnection {
    /// Connection over the default websocket transport.
    pub fn new(config: ConnectorConfig, credentials: ApiCredentials) -> Self {
        let transport = Arc::new(WsTransport::new(config.connect_timeout));
        Self::with_transport(config, credentials, transport)
    }

    pub fn with_transport(
        config: ConnectorConfig,
        credentials: ApiCredentials,
        transport: Arc<dyn FeedTransport>,
    ) -> Self {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            credentials,
            transport,
            clock: Arc::new(current_timestamp),
            metrics: create_metrics(),
            frame_log: None,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Idle),
                last_error: RwLock::new(None),
                stopped: AtomicBool::new(true),
                lifecycle,
            }),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Replace the timestamp source used when signing subscribe frames.
    pub fn with_clock(mut self, clock: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Record every raw inbound text frame.
    pub fn with_frame_log(mut self, frame_log: Arc<dyn FrameLog>) -> Self {
        self.frame_log = Some(frame_log);
        self
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Most recent error, including recoverable ones.
    pub fn last_error(&self) -> Option<ConnectorError> {
        self.shared.last_error.read().clone()
    }

    /// True before `start` and after the connection has stopped for good.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.lifecycle.subscribe()
    }

    /// Connect, subscribe, and hand the session to the supervisor task.
    ///
    /// Decoded frames are delivered to `sender` in arrival order.
    ///
    /// # Errors
    /// - `ConnectorError::Config` if the configuration is invalid or the
    ///   connection was already started.
    /// - `ConnectorError::Connect` if the first handshake or subscribe fails.
    ///   Nothing is retried in that case.
    pub async fn start(&self, sender: MessageSender) -> Result<(), ConnectorError> {
        self.config.validate()?;

        if self.state() != ConnectionState::Idle || self.task.lock().is_some() {
            return Err(ConnectorError::Config(
                "connection was already started".to_string(),
            ));
        }

        let ctx = Arc::new(self.session_context());
        self.shared.stopped.store(false, Ordering::SeqCst);

        let session = match open_session(&ctx, 0).await {
            Ok(session) => session,
            Err(e) => {
                let e = match e {
                    ConnectorError::Connect(_) => e,
                    other => ConnectorError::Connect(other.to_string()),
                };
                error!(url = %self.config.url, error = %e, "Initial connection failed");
                self.shared.record_error(e.clone());
                self.shared.stopped.store(true, Ordering::SeqCst);
                self.shared.set_state(ConnectionState::Closed);
                return Err(e);
            }
        };

        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(run_supervisor(ctx, session, sender, shutdown_rx));
        *self.task.lock() = Some(handle);

        Ok(())
    }

    /// Stop the connection and wait for its tasks to finish.
    ///
    /// Idempotent: later calls find nothing to join and return immediately.
    /// Closing a connection that was never started moves it straight to
    /// `Closed`, so it cannot be started afterwards.
    pub async fn close(&self) {
        let handle = self.task.lock().take();
        self.shared.stopped.store(true, Ordering::SeqCst);
        if handle.is_some() {
            self.shared.begin_closing();
        } else if self.state() == ConnectionState::Idle {
            self.shared.set_state(ConnectionState::Closed);
        }
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Feed task panicked");
            }
        }
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            transport: Arc::clone(&self.transport),
            clock: Arc::clone(&self.clock),
            metrics: Arc::clone(&self.metrics),
            frame_log: self.frame_log.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for FeedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConnection")
            .field("url", &self.config.url)
            .field("channel", &self.config.channel)
            .field("products", &self.config.products)
            .field("state", &self.state())
            .finish()
    }
}

/// Resolves once shutdown has been requested or the connection handle is gone.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Handshake, send a freshly signed subscribe frame, and start keepalive.
async fn open_session(ctx: &SessionContext, attempt: u32) -> Result<Session, ConnectorError> {
    let config = &ctx.config;
    ctx.shared.set_state(ConnectionState::Connecting);
    info!(url = %config.url, attempt = attempt, "Connecting to feed");

    let (mut writer, reader) = ctx.transport.connect(&config.url).await?;

    let timestamp = (ctx.clock)();
    let request =
        SubscribeRequest::signed(&ctx.credentials, &config.channel, &config.products, &timestamp);

    if let Err(e) = writer.send_text(request.to_json()?).await {
        let _ = writer.close().await;
        return Err(ConnectorError::Connect(format!("subscribe failed: {}", e)));
    }

    info!(
        channel = %config.channel,
        products = ?config.products,
        attempt = attempt,
        "Subscribed"
    );
    ctx.shared.set_state(ConnectionState::Subscribed);
    ctx.shared.emit(ConnectionEvent::Subscribed { attempt });

    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(writer));
    let (keepalive_stop, stop_rx) = watch::channel(false);
    let keepalive = tokio::spawn(run_keepalive(
        Arc::clone(&writer),
        config.keepalive_interval,
        stop_rx,
        Arc::clone(&ctx.metrics),
    ));

    Ok(Session {
        writer,
        reader,
        keepalive_stop,
        keepalive,
        connected_at: Instant::now(),
    })
}

/// Ping every `interval` until stopped or a ping fails.
async fn run_keepalive(
    writer: SharedWriter,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    metrics: SharedMetrics,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut stop_rx) => break,
            _ = ticker.tick() => {}
        }

        // A stop also cancels a ping stuck on a peer that stopped reading.
        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut stop_rx) => break,
            result = send_ping(&writer) => result,
        };

        match result {
            Ok(()) => {
                metrics.inc_pings_sent();
                debug!("Keepalive ping sent");
            }
            Err(e) => {
                // The receive loop sees the same failure and reconnects.
                debug!(error = %e, "Keepalive ping failed");
                break;
            }
        }
    }
}

async fn send_ping(writer: &SharedWriter) -> Result<(), ConnectorError> {
    writer.lock().await.send_ping(KEEPALIVE_PAYLOAD.to_vec()).await
}

/// Receive frames until shutdown, consumer loss, or a transport failure.
async fn receive_loop(
    ctx: &SessionContext,
    session: &mut Session,
    sender: &MessageSender,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let mut listening = false;

    loop {
        let frame = tokio::select! {
            biased;

            _ = wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown signal received, closing connection");
                return SessionEnd::Shutdown;
            }

            frame = session.reader.next_frame() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return SessionEnd::Failed(e),
            None => {
                return SessionEnd::Failed(ConnectorError::Transport(
                    "connection closed by peer".to_string(),
                ))
            }
        };

        if !listening {
            listening = true;
            ctx.shared.set_state(ConnectionState::Listening);
        }

        match frame {
            Frame::Text(text) => {
                ctx.metrics.inc_frames_received();

                if let Some(log) = &ctx.frame_log {
                    if let Err(e) = log.record(&text) {
                        warn!(error = %e, "Failed to record frame");
                    }
                }

                let message = match decode_frame(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        ctx.metrics.inc_decode_errors();
                        warn!(error = %e, "Failed to decode frame");
                        ctx.shared.record_error(e);
                        continue;
                    }
                };

                tokio::select! {
                    biased;

                    _ = wait_for_shutdown(shutdown_rx) => return SessionEnd::Shutdown,

                    sent = sender.send(message) => {
                        if sent.is_err() {
                            info!("Receiver dropped, stopping connection");
                            return SessionEnd::ChannelClosed;
                        }
                    }
                }
            }
            Frame::Ping(payload) => {
                debug!("Received Ping, sending Pong");
                let writer = &session.writer;
                let sent = tokio::select! {
                    biased;
                    _ = wait_for_shutdown(shutdown_rx) => return SessionEnd::Shutdown,
                    sent = async { writer.lock().await.send_pong(payload).await } => sent,
                };
                if let Err(e) = sent {
                    return SessionEnd::Failed(e);
                }
            }
            Frame::Close(reason) => {
                info!(reason = ?reason, "Connection closed by server");
                return SessionEnd::Failed(ConnectorError::Transport(format!(
                    "closed by server: {}",
                    reason.unwrap_or_default()
                )));
            }
            Frame::Pong(_) => {}
            Frame::Binary(data) => {
                debug!(len = data.len(), "Ignoring binary frame");
            }
        }
    }
}

/// Drive sessions until shutdown, reconnecting after every failure.
async fn run_supervisor(
    ctx: Arc<SessionContext>,
    first: Session,
    sender: MessageSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = ctx.config.reconnect.build();
    let mut session = Some(first);
    let mut attempt: u32 = 0;

    loop {
        if let Some(mut current) = session.take() {
            let end = receive_loop(&ctx, &mut current, &sender, &mut shutdown_rx).await;
            let lifetime = current.connected_at.elapsed();
            current.teardown().await;

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::ChannelClosed => {
                    ctx.shared.record_error(ConnectorError::ChannelClosed);
                    break;
                }
                SessionEnd::Failed(e) => {
                    ctx.metrics.inc_transport_errors();
                    warn!(error = %e, session_secs = lifetime.as_secs(), "Connection lost");
                    ctx.shared.record_error(e);

                    if lifetime >= ctx.config.stable_connection_threshold {
                        info!(
                            duration_secs = lifetime.as_secs(),
                            "Connection was stable, resetting backoff"
                        );
                        backoff.reset();
                    }
                }
            }
        }

        if ctx.shared.stopped.load(Ordering::SeqCst) {
            break;
        }

        ctx.shared.set_state(ConnectionState::Connecting);
        attempt += 1;
        let delay = backoff.next_delay();
        ctx.metrics.inc_reconnect_attempts();
        ctx.shared.emit(ConnectionEvent::Reconnecting { attempt, delay });
        info!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );

        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
            result = open_session(&ctx, attempt) => result,
        };

        match result {
            Ok(new_session) => {
                ctx.metrics.inc_reconnect_successes();
                session = Some(new_session);
            }
            Err(e) => {
                ctx.metrics.inc_transport_errors();
                warn!(error = %e, attempt = attempt, "Reconnect failed");
                ctx.shared.record_error(e);
            }
        }
    }

    ctx.shared.stopped.store(true, Ordering::SeqCst);
    ctx.shared.set_state(ConnectionState::Closed);
    ctx.shared.emit(ConnectionEvent::Closed);
    info!("Feed connection closed");
}
