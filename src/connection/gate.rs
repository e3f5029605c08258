//! Serialized construction and hand-off of outgoing frames.

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::protocol::{MaskGenerator, OpCode, encode_frame};

/// Above this capacity the shared buffer is released after a send instead of
/// being kept for reuse.
const RETAINED_CAPACITY: usize = 1024 * 1024;

struct Outbound {
    buf: BytesMut,
    masks: MaskGenerator,
    initial_capacity: usize,
}

/// Mutual exclusion over the outbound frame buffer of one client.
///
/// Exactly one thread at a time encodes a frame into the shared buffer and
/// hands it to the transport, so frames from concurrent producers are never
/// interleaved on the wire. Masking keys come from a generator owned by the
/// gate, so no key source is shared between clients.
pub struct SendGate {
    outbound: Mutex<Outbound>,
}

impl SendGate {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            outbound: Mutex::new(Outbound {
                buf: BytesMut::with_capacity(capacity),
                masks: MaskGenerator::new(),
                initial_capacity: capacity,
            }),
        }
    }

    /// Encode one masked, final frame and pass its bytes to `transmit`
    /// while holding the gate.
    ///
    /// `status` is prepended to `payload` for Close frames.
    pub fn send<R>(
        &self,
        opcode: OpCode,
        payload: &[u8],
        status: Option<u16>,
        transmit: impl FnOnce(&[u8]) -> R,
    ) -> R {
        let mut outbound = self.outbound.lock();
        outbound.transmit(opcode, payload, status, transmit)
    }

    /// Like [`SendGate::send`], but `admit` runs first with the gate held and
    /// can refuse the frame.
    ///
    /// Whatever `admit` checks cannot change between the check and the
    /// frame reaching the transport, as long as the change itself sends
    /// through this gate afterwards.
    ///
    /// # Errors
    ///
    /// The error returned by `admit`; nothing is encoded then.
    pub fn send_if<R, E>(
        &self,
        opcode: OpCode,
        payload: &[u8],
        status: Option<u16>,
        admit: impl FnOnce() -> Result<(), E>,
        transmit: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, E> {
        let mut outbound = self.outbound.lock();
        admit()?;
        Ok(outbound.transmit(opcode, payload, status, transmit))
    }
}

impl Outbound {
    fn transmit<R>(
        &mut self,
        opcode: OpCode,
        payload: &[u8],
        status: Option<u16>,
        transmit: impl FnOnce(&[u8]) -> R,
    ) -> R {
        self.buf.clear();
        let mask = self.masks.next_mask();
        let len = encode_frame(&mut self.buf, opcode, payload, status, Some(mask));
        tracing::trace!(%opcode, len, "sending frame");

        let result = transmit(&self.buf[..]);

        if self.buf.capacity() > RETAINED_CAPACITY.max(self.initial_capacity) {
            self.buf = BytesMut::with_capacity(self.initial_capacity);
        }
        result
    }
}

impl std::fmt::Debug for SendGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGate").finish_non_exhaustive()
    }
}
