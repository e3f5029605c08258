//! Close handshake bookkeeping (RFC 6455 Section 7).
//!
//! 1. Either side sends a Close frame with an optional status code.
//! 2. The receiver echoes a Close frame back.
//! 3. The transport is torn down and both sides are closed.
//!
//! The negotiator only decides; sending frames and tearing the transport
//! down is done by the client with the negotiator's lock released.

use crate::connection::ConnectionState;
use crate::message::{CloseCode, CloseFrame};

/// What the client must do after a Close frame arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Echo a Close with this status, then tear the transport down.
    Echo(u16),
    /// Our own Close was answered; tear the transport down.
    Teardown,
    /// A close is already under way; nothing to do.
    Ignore,
}

/// Tracks connection state plus who closed and with what status.
#[derive(Debug, Clone)]
pub struct CloseNegotiator {
    state: ConnectionState,
    sent: Option<u16>,
    received: Option<CloseFrame>,
}

impl Default for CloseNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseNegotiator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Closed,
            sent: None,
            received: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Status we sent in our Close frame, if any.
    #[must_use]
    pub const fn sent_status(&self) -> Option<u16> {
        self.sent
    }

    /// Close frame received from the server, if any.
    #[must_use]
    pub fn received(&self) -> Option<&CloseFrame> {
        self.received.as_ref()
    }

    /// `Closed -> Connecting`. Returns `false` if a connection is active.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Connecting;
        self.sent = None;
        self.received = None;
        true
    }

    /// `Connecting -> Open`. Returns `false` in any other state.
    pub fn handshaked(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Open;
        true
    }

    /// Start a locally initiated close.
    ///
    /// Returns `true` if the caller must send a Close with `status`; only the
    /// first close of an open connection does.
    pub fn local_close(&mut self, status: u16) -> bool {
        match self.state {
            ConnectionState::Open => {
                self.state = ConnectionState::ClosingLocal;
                self.sent = Some(status);
                true
            }
            ConnectionState::Connecting => {
                self.state = ConnectionState::ClosingLocal;
                false
            }
            _ => false,
        }
    }

    /// Record a Close frame from the server and decide the reply.
    pub fn remote_close(&mut self, frame: Option<CloseFrame>) -> CloseAction {
        let status = frame
            .as_ref()
            .map_or(CloseCode::Normal.as_u16(), |f| f.code.as_u16());
        self.received = frame;
        match self.state {
            ConnectionState::Open => {
                self.state = ConnectionState::ClosingRemote;
                self.sent = Some(status);
                CloseAction::Echo(status)
            }
            ConnectionState::ClosingLocal | ConnectionState::Connecting => {
                self.state = ConnectionState::ClosingLocal;
                CloseAction::Teardown
            }
            ConnectionState::ClosingRemote | ConnectionState::Closed => CloseAction::Ignore,
        }
    }

    /// The transport went down. Returns `false` if already closed.
    pub fn disconnected(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;
        true
    }
}
