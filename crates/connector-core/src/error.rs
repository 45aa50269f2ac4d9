use thiserror::Error;

/// Connector failures, grouped by how the connection reacts to them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// One inbound frame could not be decoded. The frame is skipped.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The exchange answered with an error frame. The frame is skipped.
    #[error("Rejected by exchange: {0}")]
    Rejected(String),

    /// The transport failed or was closed by the peer. Triggers a reconnect.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The handshake failed.
    #[error("Connect error: {0}")]
    Connect(String),

    /// Setup mistake. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The consumer dropped its receiver.
    #[error("Channel closed")]
    ChannelClosed,
}

impl ConnectorError {
    /// Errors confined to a single frame; the receive loop keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConnectorError::Decode(_) | ConnectorError::Rejected(_))
    }

    /// Errors that end the current session and lead to a new connection.
    pub fn triggers_reconnect(&self) -> bool {
        matches!(
            self,
            ConnectorError::Transport(_) | ConnectorError::Connect(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, ConnectorError::Config(_))
    }
}
