//! Client connection state machine.

/// Lifecycle state of a client connection.
///
/// A client starts `Closed`, moves to `Connecting` when a connect is
/// issued, to `Open` once the handshake completes, through one of the
/// closing states, and back to `Closed` when the transport confirms the
/// disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Transport connect and upgrade handshake in progress.
    Connecting,
    /// Handshake complete; data may flow both ways.
    Open,
    /// We sent a Close frame and are waiting for the transport to go down.
    ClosingLocal,
    /// The server sent a Close frame; our echo is on its way.
    ClosingRemote,
    /// No connection.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for every state except `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    /// Application frames may only be sent while `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Returns `true` while either side's Close is in flight.
    #[must_use]
    #[inline]
    pub const fn is_closing(&self) -> bool {
        matches!(
            self,
            ConnectionState::ClosingLocal | ConnectionState::ClosingRemote
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::ClosingLocal => write!(f, "ClosingLocal"),
            ConnectionState::ClosingRemote => write!(f, "ClosingRemote"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_send_in_each_state() {
        assert!(!ConnectionState::Connecting.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::ClosingLocal.can_send());
        assert!(!ConnectionState::ClosingRemote.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(ConnectionState::ClosingLocal.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_is_closing() {
        assert!(ConnectionState::ClosingLocal.is_closing());
        assert!(ConnectionState::ClosingRemote.is_closing());
        assert!(!ConnectionState::Open.is_closing());
        assert!(!ConnectionState::Closed.is_closing());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::ClosingLocal.to_string(), "ClosingLocal");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
