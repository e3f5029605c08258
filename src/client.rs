//! The WebSocket client engine.
//!
//! [`WssClient`] owns the protocol state of one connection over a
//! [`Transport`]: it frames and masks outgoing messages, decodes the inbound
//! byte stream, drives the close handshake and hands completed messages to
//! either a message handler or blocking `receive_*` callers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wss_engine::{Config, WssClient};
//!
//! let client = WssClient::new(my_transport, Config::client());
//! if client.connect()? {
//!     client.send_text("hello")?;
//!     let reply = client.receive_text(None);
//!     client.disconnect();
//! }
//! ```

use std::io;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::Config;
use crate::connection::{CloseAction, CloseNegotiator, ConnectionState, ReceiveHub, SendGate};
use crate::error::{Error, Result};
use crate::handler::{Handler, MessageHandler};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::{ClientKey, FrameDecoder, Inbound, OpCode, UpgradeResponse};
use crate::transport::{Transport, TransportEvents};

/// Connection bookkeeping guarded by one lock.
struct Lifecycle {
    negotiator: CloseNegotiator,
    key: Option<ClientKey>,
    /// A thread is blocked in [`WssClient::connect`].
    sync_connect: bool,
    /// The upgrade response of this attempt failed validation.
    rejected: bool,
    response: Option<UpgradeResponse>,
}

struct Inbox {
    decoder: FrameDecoder,
    /// Set after a Close frame or a protocol error; later bytes are dropped.
    halted: bool,
}

/// A WebSocket client running over a secure transport.
///
/// All methods take `&self` and may be called from any thread. Events from
/// the transport arrive through the [`TransportEvents`] implementation.
pub struct WssClient<T: Transport> {
    transport: T,
    config: Config,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
    gate: SendGate,
    inbox: Mutex<Inbox>,
    hub: ReceiveHub,
    handler: RwLock<Option<Arc<dyn Handler>>>,
    message_handler: RwLock<Option<MessageHandler>>,
}

impl<T: Transport> WssClient<T> {
    /// Create a client over `transport` and attach it as the transport's
    /// event sink.
    pub fn new(transport: T, config: Config) -> Arc<Self> {
        let client = Arc::new(Self {
            gate: SendGate::new(config.write_buffer_size),
            inbox: Mutex::new(Inbox {
                decoder: FrameDecoder::new(&config),
                halted: false,
            }),
            transport,
            config,
            lifecycle: Mutex::new(Lifecycle {
                negotiator: CloseNegotiator::new(),
                key: None,
                sync_connect: false,
                rejected: false,
                response: None,
            }),
            changed: Condvar::new(),
            hub: ReceiveHub::new(),
            handler: RwLock::new(None),
            message_handler: RwLock::new(None),
        });
        let weak: Weak<Self> = Arc::downgrade(&client);
        let events: Weak<dyn TransportEvents> = weak;
        client.transport.attach(events);
        client
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register the lifecycle event handler, replacing any previous one.
    pub fn set_handler(&self, handler: Arc<dyn Handler>) {
        *self.handler.write() = Some(handler);
    }

    /// Deliver complete messages to `handler` instead of queueing them for
    /// `receive_*`.
    pub fn set_message_handler(&self, handler: impl Fn(Message) + Send + Sync + 'static) {
        *self.message_handler.write() = Some(Arc::new(handler));
    }

    /// Return to queueing messages for `receive_*`.
    pub fn clear_message_handler(&self) {
        *self.message_handler.write() = None;
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().negotiator.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Close frame received from the server on the current or last
    /// connection.
    pub fn close_status(&self) -> Option<CloseFrame> {
        self.lifecycle.lock().negotiator.received().cloned()
    }

    /// `Sec-WebSocket-Key` of the current or last connection attempt.
    pub fn handshake_key(&self) -> Option<String> {
        self.lifecycle
            .lock()
            .key
            .as_ref()
            .map(|key| key.as_str().to_owned())
    }

    // Connection lifecycle

    /// Connect and block until the handshake completes, the transport
    /// fails, or the handshake timeout elapses.
    ///
    /// Returns `Ok(false)` if a connection is already active or the
    /// handshake did not complete.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the nonce cannot be generated or the transport fails
    /// to connect.
    pub fn connect(&self) -> Result<bool> {
        if !self.prepare_connect(true)? {
            return Ok(false);
        }

        if let Err(err) = self.transport.connect() {
            tracing::error!(error = %err, "transport connect failed");
            self.abort_connect();
            return Err(err.into());
        }

        let deadline = self
            .config
            .handshake_timeout()
            .and_then(|t| Instant::now().checked_add(t));
        let mut lifecycle = self.lifecycle.lock();
        while lifecycle.negotiator.state() == ConnectionState::Connecting {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut lifecycle, deadline).timed_out() {
                        break;
                    }
                }
                None => self.changed.wait(&mut lifecycle),
            }
        }
        lifecycle.sync_connect = false;
        let state = lifecycle.negotiator.state();
        drop(lifecycle);

        if state == ConnectionState::Connecting {
            tracing::warn!("handshake timed out");
            self.disconnect_async();
        }
        Ok(state == ConnectionState::Open)
    }

    /// Start connecting without waiting for the handshake.
    ///
    /// Returns `Ok(false)` if a connection is already active or the
    /// transport refused to start.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the nonce cannot be generated.
    pub fn connect_async(&self) -> Result<bool> {
        if !self.prepare_connect(false)? {
            return Ok(false);
        }
        if !self.transport.connect_async() {
            tracing::warn!("transport refused to start connecting");
            self.abort_connect();
            return Ok(false);
        }
        Ok(true)
    }

    fn prepare_connect(&self, sync: bool) -> Result<bool> {
        let key = ClientKey::generate()?;
        {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.negotiator.begin_connect() {
                tracing::debug!(state = %lifecycle.negotiator.state(), "connect ignored");
                return Ok(false);
            }
            lifecycle.key = Some(key);
            lifecycle.sync_connect = sync;
            lifecycle.rejected = false;
            lifecycle.response = None;
        }
        {
            let mut inbox = self.inbox.lock();
            inbox.decoder.reset();
            inbox.halted = false;
        }
        self.hub.open();
        tracing::debug!("connecting");
        Ok(true)
    }

    fn abort_connect(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.negotiator.disconnected();
            lifecycle.sync_connect = false;
        }
        self.hub.close();
    }

    /// Close the connection and block until the transport is down.
    ///
    /// An open connection first sends a Close with status 1000. Returns
    /// `false` if already closed.
    pub fn disconnect(&self) -> bool {
        let Some(send_close) = self.begin_disconnect() else {
            return false;
        };
        if send_close {
            let status = CloseCode::Normal.as_u16();
            let sent = self.gate.send(OpCode::Close, &[], Some(status), |bytes| {
                self.transport.send(bytes)
            });
            if let Err(err) = sent {
                tracing::warn!(error = %err, "close frame not sent");
            }
        }
        self.transport.disconnect()
    }

    /// Start closing the connection without waiting.
    pub fn disconnect_async(&self) -> bool {
        let Some(send_close) = self.begin_disconnect() else {
            return false;
        };
        if send_close {
            let status = CloseCode::Normal.as_u16();
            if !self.gate.send(OpCode::Close, &[], Some(status), |bytes| {
                self.transport.send_async(bytes)
            }) {
                tracing::warn!("close frame refused by transport");
            }
        }
        self.transport.disconnect_async()
    }

    /// `None` when already closed, otherwise whether a Close must be sent.
    fn begin_disconnect(&self) -> Option<bool> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.negotiator.state() == ConnectionState::Closed {
            return None;
        }
        tracing::debug!(state = %lifecycle.negotiator.state(), "disconnecting");
        Some(lifecycle.negotiator.local_close(CloseCode::Normal.as_u16()))
    }

    // Sending

    /// Send a Text message, blocking until the transport took it.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` unless open; `Error::Io` if the transport
    /// failed.
    pub fn send_text(&self, text: impl AsRef<str>) -> Result<usize> {
        self.send_frame(OpCode::Text, text.as_ref().as_bytes(), None, None)
    }

    /// Send a Binary message.
    ///
    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_binary(&self, data: impl AsRef<[u8]>) -> Result<usize> {
        self.send_frame(OpCode::Binary, data.as_ref(), None, None)
    }

    /// Send a Ping.
    ///
    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_ping(&self, payload: impl AsRef<[u8]>) -> Result<usize> {
        self.send_frame(OpCode::Ping, payload.as_ref(), None, None)
    }

    /// Send a Pong.
    ///
    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_pong(&self, payload: impl AsRef<[u8]>) -> Result<usize> {
        self.send_frame(OpCode::Pong, payload.as_ref(), None, None)
    }

    /// [`WssClient::send_text`] bounded by `timeout`; a count below the frame
    /// size means the timeout elapsed.
    ///
    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_text_timeout(&self, text: impl AsRef<str>, timeout: Duration) -> Result<usize> {
        self.send_frame(OpCode::Text, text.as_ref().as_bytes(), None, Some(timeout))
    }

    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_binary_timeout(&self, data: impl AsRef<[u8]>, timeout: Duration) -> Result<usize> {
        self.send_frame(OpCode::Binary, data.as_ref(), None, Some(timeout))
    }

    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_ping_timeout(&self, payload: impl AsRef<[u8]>, timeout: Duration) -> Result<usize> {
        self.send_frame(OpCode::Ping, payload.as_ref(), None, Some(timeout))
    }

    /// # Errors
    ///
    /// Same as [`WssClient::send_text`].
    pub fn send_pong_timeout(&self, payload: impl AsRef<[u8]>, timeout: Duration) -> Result<usize> {
        self.send_frame(OpCode::Pong, payload.as_ref(), None, Some(timeout))
    }

    /// Queue a Text message. `Ok(false)` means the transport refused it.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` unless open.
    pub fn send_text_async(&self, text: impl AsRef<str>) -> Result<bool> {
        self.send_frame_async(OpCode::Text, text.as_ref().as_bytes(), None)
    }

    /// # Errors
    ///
    /// `Error::ConnectionClosed` unless open.
    pub fn send_binary_async(&self, data: impl AsRef<[u8]>) -> Result<bool> {
        self.send_frame_async(OpCode::Binary, data.as_ref(), None)
    }

    /// # Errors
    ///
    /// `Error::ConnectionClosed` unless open.
    pub fn send_ping_async(&self, payload: impl AsRef<[u8]>) -> Result<bool> {
        self.send_frame_async(OpCode::Ping, payload.as_ref(), None)
    }

    /// # Errors
    ///
    /// `Error::ConnectionClosed` unless open.
    pub fn send_pong_async(&self, payload: impl AsRef<[u8]>) -> Result<bool> {
        self.send_frame_async(OpCode::Pong, payload.as_ref(), None)
    }

    /// Start the close handshake with `code` and `reason`.
    ///
    /// The connection moves to `ClosingLocal`; the transport is torn down
    /// once the server answers. Once a close is under way, or the connection
    /// is closed, this is a no-op returning `Ok(0)`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for codes that must not go on the wire
    /// - `Error::ConnectionClosed` while still connecting
    /// - `Error::Io` if the transport failed
    pub fn send_close(&self, code: CloseCode, reason: &str) -> Result<usize> {
        self.send_close_inner(code, reason, None)
    }

    /// [`WssClient::send_close`] bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`WssClient::send_close`].
    pub fn send_close_timeout(&self, code: CloseCode, reason: &str, timeout: Duration) -> Result<usize> {
        self.send_close_inner(code, reason, Some(timeout))
    }

    /// Queue a Close frame and start the close handshake. `Ok(false)` if
    /// nothing was queued because a close is under way or already done.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCloseCode` or `Error::ConnectionClosed`.
    pub fn send_close_async(&self, code: CloseCode, reason: &str) -> Result<bool> {
        let Some(status) = self.begin_local_close(code)? else {
            return Ok(false);
        };
        Ok(self.transmit_async(OpCode::Close, reason.as_bytes(), Some(status)))
    }

    fn send_close_inner(&self, code: CloseCode, reason: &str, timeout: Option<Duration>) -> Result<usize> {
        let Some(status) = self.begin_local_close(code)? else {
            return Ok(0);
        };
        self.transmit(OpCode::Close, reason.as_bytes(), Some(status), timeout, || Ok(()))
    }

    /// `Ok(None)` when a close is already under way or done.
    fn begin_local_close(&self, code: CloseCode) -> Result<Option<u16>> {
        if !code.is_allowed() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        let mut lifecycle = self.lifecycle.lock();
        let negotiator = &mut lifecycle.negotiator;
        match negotiator.state() {
            ConnectionState::Open => {
                negotiator.local_close(code.as_u16());
                tracing::debug!(status = code.as_u16(), "closing");
                Ok(Some(code.as_u16()))
            }
            ConnectionState::ClosingLocal
            | ConnectionState::ClosingRemote
            | ConnectionState::Closed => Ok(None),
            ConnectionState::Connecting => Err(Error::ConnectionClosed(None)),
        }
    }

    /// Runs with the send gate held, see [`SendGate::send_if`].
    fn ensure_open(&self) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.negotiator.state().can_send() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed(
                lifecycle.negotiator.received().map(|f| f.code.as_u16()),
            ))
        }
    }

    fn send_frame(
        &self,
        opcode: OpCode,
        payload: &[u8],
        status: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        self.transmit(opcode, payload, status, timeout, || self.ensure_open())
    }

    fn send_frame_async(&self, opcode: OpCode, payload: &[u8], status: Option<u16>) -> Result<bool> {
        let queued = self.gate.send_if(
            opcode,
            payload,
            status,
            || self.ensure_open(),
            |bytes| self.transport.send_async(bytes),
        )?;
        if !queued {
            tracing::warn!(%opcode, "frame refused by transport");
        }
        Ok(queued)
    }

    fn transmit(
        &self,
        opcode: OpCode,
        payload: &[u8],
        status: Option<u16>,
        timeout: Option<Duration>,
        admit: impl FnOnce() -> Result<()>,
    ) -> Result<usize> {
        let timeout = timeout.or_else(|| self.config.send_timeout());
        let sent = self.gate.send_if(opcode, payload, status, admit, |bytes| match timeout {
            Some(timeout) => self.transport.send_timeout(bytes, timeout),
            None => self.transport.send(bytes),
        })?;
        sent.map_err(|err| {
            self.on_transport_error(&err);
            Error::from(err)
        })
    }

    /// Queue a frame without checking the state; only for Close frames the
    /// negotiator decided to send.
    fn transmit_async(&self, opcode: OpCode, payload: &[u8], status: Option<u16>) -> bool {
        let queued = self
            .gate
            .send(opcode, payload, status, |bytes| self.transport.send_async(bytes));
        if !queued {
            tracing::warn!(%opcode, "frame refused by transport");
        }
        queued
    }

    // Receiving

    /// Pop the next received message, waiting up to `timeout` (or the
    /// configured receive timeout). `None` on timeout or once the
    /// connection is closed and nothing is queued.
    pub fn receive(&self, timeout: Option<Duration>) -> Option<Message> {
        self.hub.pop(timeout.or_else(|| self.config.receive_timeout()))
    }

    /// Like [`WssClient::receive`], yielding the payload as text. Binary
    /// payloads are converted lossily.
    pub fn receive_text(&self, timeout: Option<Duration>) -> Option<String> {
        self.receive(timeout).map(Message::into_text)
    }

    /// Like [`WssClient::receive`], yielding the payload bytes.
    pub fn receive_binary(&self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        self.receive(timeout).map(Message::into_binary)
    }

    // Inbound dispatch

    fn current_handler(&self) -> Option<Arc<dyn Handler>> {
        self.handler.read().clone()
    }

    fn report(&self, error: &Error) {
        if let Some(handler) = self.current_handler() {
            handler.on_error(error);
        }
    }

    fn dispatch(&self, event: Inbound) {
        match event {
            Inbound::Message(message) => {
                let push = self.message_handler.read().clone();
                match push {
                    Some(deliver) => deliver(message),
                    None => self.hub.push(message),
                }
            }
            Inbound::Ping(payload) => {
                tracing::trace!(len = payload.len(), "ping received");
                if self.config.auto_pong {
                    if let Err(error) = self.send_frame_async(OpCode::Pong, &payload, None) {
                        tracing::trace!(%error, "pong not sent");
                    }
                }
                if let Some(handler) = self.current_handler() {
                    handler.on_ping(&payload);
                }
            }
            Inbound::Pong(payload) => {
                tracing::trace!(len = payload.len(), "pong received");
                if let Some(handler) = self.current_handler() {
                    handler.on_pong(&payload);
                }
            }
            Inbound::Close(frame) => self.remote_close(frame),
        }
    }

    fn remote_close(&self, frame: Option<CloseFrame>) {
        if let Some(handler) = self.current_handler() {
            handler.on_close(frame.as_ref());
        }
        let action = self.lifecycle.lock().negotiator.remote_close(frame);
        tracing::debug!(?action, "close frame received");
        match action {
            CloseAction::Echo(status) => {
                self.transmit_async(OpCode::Close, &[], Some(status));
                self.transport.disconnect_async();
            }
            CloseAction::Teardown => {
                self.transport.disconnect_async();
            }
            CloseAction::Ignore => {}
        }
    }

    fn protocol_fault(&self, error: Error) {
        tracing::warn!(%error, "protocol error, closing connection");
        self.report(&Error::ws_fault(error.to_string()));
        let send_close = self.lifecycle.lock().negotiator.local_close(error.close_code());
        if send_close {
            self.transmit_async(OpCode::Close, &[], Some(error.close_code()));
        }
        self.transport.disconnect_async();
    }
}

impl<T: Transport> TransportEvents for WssClient<T> {
    fn upgrade_key(&self) -> Option<String> {
        self.handshake_key()
    }

    fn on_received_response_header(&self, response: &UpgradeResponse) {
        let verdict = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.negotiator.state() != ConnectionState::Connecting {
                return;
            }
            let verdict = match &lifecycle.key {
                Some(key) => response.validate(key),
                None => Err(Error::InvalidHandshake("no handshake in progress".into())),
            };
            match verdict {
                Ok(()) => lifecycle.response = Some(response.clone()),
                Err(_) => lifecycle.rejected = true,
            }
            verdict
        };

        if let Err(error) = verdict {
            tracing::warn!(%error, "upgrade response rejected");
            self.report(&Error::ws_fault(error.to_string()));
            self.transport.disconnect_async();
        }
    }

    fn on_handshaked(&self) {
        let response = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.rejected || !lifecycle.negotiator.handshaked() {
                return;
            }
            if lifecycle.sync_connect {
                self.changed.notify_all();
            }
            lifecycle.response.take()
        };
        tracing::debug!("connection open");
        if let Some(handler) = self.current_handler() {
            handler.on_connected(response.as_ref());
        }
    }

    fn on_received(&self, data: &[u8]) {
        if self.state() == ConnectionState::Closed {
            return;
        }

        // Dispatch happens with the inbox released: replies and teardown may
        // re-enter this client synchronously.
        let mut events = Vec::new();
        let mut fault = None;
        {
            let mut inbox = self.inbox.lock();
            if inbox.halted {
                return;
            }
            inbox.decoder.feed(data);
            loop {
                match inbox.decoder.next_event() {
                    Ok(Some(event)) => {
                        let last = matches!(event, Inbound::Close(_));
                        events.push(event);
                        if last {
                            inbox.halted = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        inbox.halted = true;
                        fault = Some(error);
                        break;
                    }
                }
            }
        }

        for event in events {
            self.dispatch(event);
        }
        if let Some(error) = fault {
            self.protocol_fault(error);
        }
    }

    fn on_disconnected(&self) {
        let changed = {
            let mut lifecycle = self.lifecycle.lock();
            let changed = lifecycle.negotiator.disconnected();
            lifecycle.sync_connect = false;
            self.changed.notify_all();
            changed
        };
        {
            let mut inbox = self.inbox.lock();
            inbox.decoder.reset();
            inbox.halted = true;
        }
        self.hub.close();

        if changed {
            tracing::debug!("connection closed");
            if let Some(handler) = self.current_handler() {
                handler.on_disconnected();
            }
        }
    }

    fn on_transport_error(&self, error: &io::Error) {
        tracing::error!(%error, "transport error");
        self.report(&Error::transport_fault(error.to_string()));
        self.on_disconnected();
    }
}

impl<T: Transport> std::fmt::Debug for WssClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WssClient")
            .field("state", &self.state())
            .field("queued", &self.hub.len())
            .finish_non_exhaustive()
    }
}
