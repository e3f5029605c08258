//! Connection event surface for the owning application.

use crate::error::Error;
use crate::message::{CloseFrame, Message};
use crate::protocol::UpgradeResponse;

/// Receives lifecycle and control-frame events of a client.
///
/// Every method has an empty default. Callbacks run on the transport's I/O
/// context; they may send but must not block waiting for received data.
pub trait Handler: Send + Sync {
    /// The handshake completed. `response` is the validated upgrade
    /// response, if the transport reported one.
    fn on_connected(&self, response: Option<&UpgradeResponse>) {
        let _ = response;
    }

    /// The connection is closed.
    fn on_disconnected(&self) {}

    /// The server sent a Ping.
    fn on_ping(&self, payload: &[u8]) {
        let _ = payload;
    }

    /// The server sent a Pong.
    fn on_pong(&self, payload: &[u8]) {
        let _ = payload;
    }

    /// The server sent a Close frame.
    fn on_close(&self, frame: Option<&CloseFrame>) {
        let _ = frame;
    }

    /// A protocol or transport fault. Always an [`Error::Fault`].
    fn on_error(&self, error: &Error) {
        let _ = error;
    }
}

/// Push-mode receiver for complete messages.
pub type MessageHandler = std::sync::Arc<dyn Fn(Message) + Send + Sync>;
