//! The byte-stream capability the engine runs on.
//!
//! TCP, TLS and the HTTP Upgrade exchange live behind [`Transport`]. The
//! transport reports back through [`TransportEvents`], which the client
//! implements; it receives a weak handle to it via [`Transport::attach`].

use std::io;
use std::sync::Weak;
use std::time::Duration;

use crate::protocol::UpgradeResponse;

/// A secure, already framed-for-HTTP byte transport.
///
/// Synchronous methods may block the calling thread; the `*_async` ones
/// only queue work on the transport's I/O path and report whether it was
/// accepted.
pub trait Transport: Send + Sync + 'static {
    /// Receive the handle used to report events. Called once, right after
    /// the client is constructed.
    fn attach(&self, events: Weak<dyn TransportEvents>) {
        let _ = events;
    }

    /// Connect, secure and upgrade the stream, blocking until the
    /// connection is established or has failed.
    ///
    /// # Errors
    ///
    /// Any failure to establish the connection.
    fn connect(&self) -> io::Result<()>;

    /// Start connecting without blocking. Returns `false` if the attempt
    /// could not be started.
    fn connect_async(&self) -> bool;

    /// Close the stream, blocking until it is down.
    fn disconnect(&self) -> bool;

    /// Start closing the stream without blocking.
    fn disconnect_async(&self) -> bool;

    /// Write all of `data`, blocking. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Any write failure; the connection is then considered lost.
    fn send(&self, data: &[u8]) -> io::Result<usize>;

    /// Like [`Transport::send`], giving up after `timeout`. A short count
    /// (possibly 0) means the timeout elapsed.
    ///
    /// # Errors
    ///
    /// Any write failure; the connection is then considered lost.
    fn send_timeout(&self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        let _ = timeout;
        self.send(data)
    }

    /// Queue `data` for sending. Returns `false` if it was refused.
    fn send_async(&self, data: &[u8]) -> bool;
}

/// Callbacks a transport invokes from its I/O context.
///
/// Delivery callbacks for one connection are expected to come from a
/// single execution context at a time.
pub trait TransportEvents: Send + Sync {
    /// `Sec-WebSocket-Key` to put in the upgrade request of the current
    /// connection attempt.
    fn upgrade_key(&self) -> Option<String>;

    /// The server's response to the upgrade request arrived.
    fn on_received_response_header(&self, response: &UpgradeResponse);

    /// The upgrade handshake completed successfully.
    fn on_handshaked(&self);

    /// Bytes arrived from the server.
    fn on_received(&self, data: &[u8]);

    /// The stream is down.
    fn on_disconnected(&self);

    /// The transport hit an error; the connection is lost.
    fn on_transport_error(&self, error: &io::Error);
}
