use std::fmt;

/// Lifecycle of one feed connection.
///
/// `Idle -> Connecting -> Subscribed -> Listening`, back to `Connecting` on a
/// transport failure, and `Closing -> Closed` only when the owner closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    /// Handshake done and subscribe frame sent.
    Subscribed,
    /// First frame received after subscribing.
    Listening,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    /// Whether a transport is (or is about to be) established.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Subscribed | ConnectionState::Listening
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Listening => "listening",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_helpers() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Closing.is_terminal());
        assert!(ConnectionState::Listening.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert_eq!(ConnectionState::Subscribed.to_string(), "subscribed");
    }
}
