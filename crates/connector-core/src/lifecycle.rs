use crate::error::ConnectorError;
use crate::state::ConnectionState;
use std::time::Duration;

/// Published by a feed connection to anyone who subscribed to its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    /// Subscribe frame sent. `attempt` is 0 for the first session.
    Subscribed { attempt: u32 },
    /// An error was recorded; see `ConnectorError` for whether it ended the session.
    Error(ConnectorError),
    /// Waiting `delay` before reconnect number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The connection was closed by its owner and will not reconnect.
    Closed,
}
