//! In-memory transport that plays the server side.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use wss_engine::protocol::Frame;
use wss_engine::{Transport, TransportEvents, UpgradeResponse, compute_accept_key};

/// How [`MockTransport::connect`] answers the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Valid 101 response, then `on_handshaked`.
    Accept,
    /// 101 response with a wrong `Sec-WebSocket-Accept`, then `on_handshaked`.
    BadAccept,
    /// Nothing happens until the test calls [`MockTransport::accept`].
    Manual,
}

pub struct MockTransport {
    events: Mutex<Option<Weak<dyn TransportEvents>>>,
    wire: Mutex<Vec<u8>>,
    mode: HandshakeMode,
    refuse_async: AtomicBool,
    stall_sends: AtomicBool,
    fail_connect: AtomicBool,
    disconnects: AtomicUsize,
}

impl MockTransport {
    pub fn new(mode: HandshakeMode) -> Self {
        Self {
            events: Mutex::new(None),
            wire: Mutex::new(Vec::new()),
            mode,
            refuse_async: AtomicBool::new(false),
            stall_sends: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    fn events(&self) -> Arc<dyn TransportEvents> {
        self.events
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("transport not attached")
    }

    /// Answer the pending upgrade with a valid response.
    pub fn accept(&self) {
        let events = self.events();
        let key = events.upgrade_key().expect("no connect in progress");
        events.on_received_response_header(&upgrade_response(&compute_accept_key(&key)));
        events.on_handshaked();
    }

    pub fn respond(&self, response: &UpgradeResponse) {
        self.events().on_received_response_header(response);
    }

    pub fn handshaked(&self) {
        self.events().on_handshaked();
    }

    /// Deliver bytes as if read from the socket.
    pub fn deliver(&self, data: &[u8]) {
        self.events().on_received(data);
    }

    /// Drop the connection from the server side.
    pub fn drop_connection(&self) {
        self.events().on_disconnected();
    }

    pub fn fail(&self, error: io::Error) {
        self.events().on_transport_error(&error);
    }

    pub fn set_refuse_async(&self, refuse: bool) {
        self.refuse_async.store(refuse, Ordering::SeqCst);
    }

    /// Make timed sends report that nothing went out.
    pub fn set_stall_sends(&self, stall: bool) {
        self.stall_sends.store(stall, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn wire(&self) -> Vec<u8> {
        self.wire.lock().clone()
    }

    /// Every frame written so far, unmasked.
    pub fn frames(&self) -> Vec<Frame> {
        let wire = self.wire.lock();
        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < wire.len() {
            let (frame, used) = Frame::parse(&wire[offset..]).expect("client wrote a bad frame");
            frames.push(frame);
            offset += used;
        }
        frames
    }

    pub fn clear(&self) {
        self.wire.lock().clear();
    }
}

pub fn upgrade_response(accept: &str) -> UpgradeResponse {
    UpgradeResponse::new(101)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Accept", accept)
}

impl Transport for MockTransport {
    fn attach(&self, events: Weak<dyn TransportEvents>) {
        *self.events.lock() = Some(events);
    }

    fn connect(&self) -> io::Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        match self.mode {
            HandshakeMode::Accept => self.accept(),
            HandshakeMode::BadAccept => {
                self.respond(&upgrade_response("bm90IHRoZSByaWdodCBrZXk="));
                self.handshaked();
            }
            HandshakeMode::Manual => {}
        }
        Ok(())
    }

    fn connect_async(&self) -> bool {
        !self.fail_connect.load(Ordering::SeqCst)
    }

    fn disconnect(&self) -> bool {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.events().on_disconnected();
        true
    }

    fn disconnect_async(&self) -> bool {
        self.disconnect()
    }

    fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.wire.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn send_timeout(&self, data: &[u8], _timeout: Duration) -> io::Result<usize> {
        if self.stall_sends.load(Ordering::SeqCst) {
            return Ok(0);
        }
        self.send(data)
    }

    fn send_async(&self, data: &[u8]) -> bool {
        if self.refuse_async.load(Ordering::SeqCst) {
            return false;
        }
        self.wire.lock().extend_from_slice(data);
        true
    }
}
