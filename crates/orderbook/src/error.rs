//! Order book error types.

use model::Side;
use thiserror::Error;

/// Errors that can occur during order book operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderBookError {
    /// Query on a side that currently has no levels.
    #[error("{instrument}: no {side} levels")]
    EmptyBook { instrument: String, side: Side },

    /// An event was routed for a product that was never configured.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// The registry was built from an empty product list.
    #[error("no instruments configured")]
    NoInstruments,
}

impl OrderBookError {
    /// Configuration mistakes are fatal and must not be retried.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::UnknownInstrument(_) | Self::NoInstruments)
    }
}
