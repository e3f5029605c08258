//! Stream decoder turning transport bytes into frames and messages.
//!
//! Transport deliveries do not line up with frame boundaries, so bytes that
//! do not yet form a complete frame stay buffered until the next delivery.

use bytes::{Buf, BytesMut};

use crate::config::{Config, Limits};
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::assembler::MessageAssembler;
use crate::protocol::frame::announced_len;
use crate::protocol::{Frame, OpCode};

/// One unit of inbound traffic as seen by the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete (possibly reassembled) data message.
    Message(Message),
    /// A Ping with its payload.
    Ping(Vec<u8>),
    /// A Pong with its payload.
    Pong(Vec<u8>),
    /// A Close frame; `None` when it carried no status.
    Close(Option<CloseFrame>),
}

/// Incremental decoder for server-to-client traffic.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    assembler: MessageAssembler,
    limits: Limits,
    accept_masked: bool,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.read_buffer_size),
            assembler: MessageAssembler::new(config.limits.clone()),
            limits: config.limits.clone(),
            accept_masked: config.accept_masked_frames,
        }
    }

    /// Append freshly received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed by a complete frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Whether a fragmented message is pending.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.assembler.is_assembling()
    }

    /// Drop buffered bytes and any partial message.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.assembler.reset();
    }

    /// Pop the next complete frame, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// - `Error::MaskedServerFrame` unless masked frames are accepted
    /// - `Error::FrameTooLarge` as soon as the announced length exceeds the limit
    /// - any header error from [`Frame::parse`]
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < 2 {
            return Ok(None);
        }

        let masked = (self.buf[1] & 0x80) != 0;
        if masked && !self.accept_masked {
            return Err(Error::MaskedServerFrame);
        }
        if let Some((len, _)) = announced_len(&self.buf)? {
            self.limits.check_frame_size(len)?;
        }

        match Frame::parse(&self.buf) {
            Ok((frame, consumed)) => {
                self.buf.advance(consumed);
                tracing::trace!(
                    opcode = %frame.opcode,
                    fin = frame.fin,
                    len = frame.payload().len(),
                    "decoded frame"
                );
                Ok(Some(frame))
            }
            Err(Error::IncompleteFrame { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Pop the next message or control event, or `None` if more bytes are
    /// needed. Fragments are absorbed until their message completes.
    ///
    /// # Errors
    ///
    /// Any framing, fragmentation, limit or UTF-8 violation. The decoder is
    /// not usable afterwards; the connection must be torn down.
    pub fn next_event(&mut self) -> Result<Option<Inbound>> {
        while let Some(frame) = self.next_frame()? {
            frame.validate()?;
            match frame.opcode {
                OpCode::Ping => return Ok(Some(Inbound::Ping(frame.into_payload()))),
                OpCode::Pong => return Ok(Some(Inbound::Pong(frame.into_payload()))),
                OpCode::Close => {
                    let close = CloseFrame::parse(frame.payload())?;
                    return Ok(Some(Inbound::Close(close)));
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if let Some(message) = self.assembler.push(frame)? {
                        return Ok(Some(Inbound::Message(message)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Feed `data` and drain every event it completes.
    ///
    /// # Errors
    ///
    /// Same as [`FrameDecoder::next_event`]; events decoded before the
    /// failure are lost along with the connection.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Inbound>> {
        self.feed(data);
        let mut events = Vec::new();
        while let Some(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }
}
