//! Order books kept in sync with a feed connection.

use std::sync::Arc;

use connector_core::{create_message_channel, ConnectorError, MessageReceiver};
use metrics::SharedMetrics;
use orderbook::{BookRegistry, BookView, OrderBookError, RouteOutcome};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::connection::FeedConnection;

const VIEW_CAPACITY: usize = 256;

/// A `BookRegistry` fed by one `FeedConnection`.
///
/// A single router task applies decoded frames in arrival order and publishes
/// a `BookView` after every applied batch. A frame naming a product outside
/// the registry is a configuration error: the router records it and stops,
/// which in turn stops the connection.
pub struct OrderBookFeed {
    registry: Arc<BookRegistry>,
    connection: FeedConnection,
    views: broadcast::Sender<BookView>,
    fatal: Arc<RwLock<Option<ConnectorError>>>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl OrderBookFeed {
    /// Build a registry with one book per product the connection subscribes to.
    ///
    /// # Errors
    /// `ConnectorError::Config` if no products are configured.
    pub fn new(connection: FeedConnection) -> Result<Self, ConnectorError> {
        let registry = BookRegistry::new(connection.config().products.iter().cloned())
            .map_err(config_error)?;
        Ok(Self::with_registry(registry, connection))
    }

    /// Use a prepared registry, e.g. one with a gap detector attached.
    pub fn with_registry(registry: BookRegistry, connection: FeedConnection) -> Self {
        let (views, _) = broadcast::channel(VIEW_CAPACITY);
        Self {
            registry: Arc::new(registry),
            connection,
            views,
            fatal: Arc::new(RwLock::new(None)),
            router: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<BookRegistry> {
        &self.registry
    }

    pub fn connection(&self) -> &FeedConnection {
        &self.connection
    }

    /// Top-of-book views, one per applied batch.
    pub fn subscribe_views(&self) -> broadcast::Receiver<BookView> {
        self.views.subscribe()
    }

    /// Configuration error that stopped the router, if any.
    pub fn fatal_error(&self) -> Option<ConnectorError> {
        self.fatal.read().clone()
    }

    /// Fatal error if there is one, otherwise the connection's last error.
    pub fn last_error(&self) -> Option<ConnectorError> {
        self.fatal_error().or_else(|| self.connection.last_error())
    }

    /// Start the connection and the router task.
    pub async fn start(&self) -> Result<(), ConnectorError> {
        let (sender, receiver) = create_message_channel(self.connection.config().channel_capacity);
        self.connection.start(sender).await?;

        let handle = tokio::spawn(run_router(
            receiver,
            Arc::clone(&self.registry),
            self.views.clone(),
            Arc::clone(&self.fatal),
            Arc::clone(self.connection.metrics()),
        ));
        *self.router.lock() = Some(handle);

        info!(products = ?self.registry.instruments(), "Order book feed started");
        Ok(())
    }

    /// Close the connection, then wait for the router to drain. Idempotent.
    pub async fn close(&self) {
        self.connection.close().await;

        let handle = self.router.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Router task panicked");
            }
        }
    }
}

fn config_error(err: OrderBookError) -> ConnectorError {
    ConnectorError::Config(err.to_string())
}

async fn run_router(
    mut receiver: MessageReceiver,
    registry: Arc<BookRegistry>,
    views: broadcast::Sender<BookView>,
    fatal: Arc<RwLock<Option<ConnectorError>>>,
    metrics: SharedMetrics,
) {
    while let Some(message) = receiver.recv().await {
        let outcomes = match registry.route_message(&message) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!(error = %e, "Routing failed, stopping order book feed");
                *fatal.write() = Some(config_error(e));
                // Dropping the receiver stops the connection.
                return;
            }
        };

        for outcome in outcomes {
            if let RouteOutcome::Applied { instrument, .. } = outcome {
                metrics.inc_batches_applied();
                match registry.snapshot(&instrument) {
                    Ok(view) => {
                        let _ = views.send(view);
                    }
                    Err(e) => debug!(error = %e, "No view for applied batch"),
                }
            }
        }
    }

    debug!("Message channel closed, router exiting");
}
