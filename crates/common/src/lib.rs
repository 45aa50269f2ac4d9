//! Shared building blocks: reconnect backoff policies, settings loaded from
//! the environment, and logging initialisation.

mod backoff;
mod settings;

pub use backoff::{
    Backoff, BackoffConfig, ConstantBackoff, ExponentialBackoff, ParseBackoffError,
    DEFAULT_RECONNECT_DELAY,
};
pub use settings::{
    Settings, SettingsError, DEFAULT_CHANNEL, DEFAULT_KEEPALIVE, DEFAULT_PRODUCT, DEFAULT_REST_URL,
    DEFAULT_WS_URL,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG`; defaults to `info`. Safe to call more than once, later
/// calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
