//! WebSocket frame encoding and parsing (RFC 6455 Section 5.2).
//!
//! Outgoing frames are always final and, for a client, always masked.
//! Incoming frames are parsed one at a time from the front of a buffer so a
//! stream decoder can keep whatever bytes follow.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, apply_mask_fast};

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;

#[derive(Debug, Clone)]
struct FrameHeader {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Parse a frame header from the front of `buf`.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if not enough data is available
/// - `Error::InvalidOpcode` / `Error::ReservedOpcode` for unknown opcodes
/// - `Error::LengthOverflow` if the 64-bit length has its top bit set or
///   exceeds the platform's address space
#[inline]
fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = (byte0 & FIN_BIT) != 0;
    let rsv1 = (byte0 & 0x40) != 0;
    let rsv2 = (byte0 & 0x20) != 0;
    let rsv3 = (byte0 & 0x10) != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = (byte1 & MASK_BIT) != 0;
    let (payload_len, len_end) = match announced_len(buf)? {
        Some(parsed) => parsed,
        None => {
            let needed = if byte1 & 0x7F == 126 { 4 } else { 10 };
            return Err(Error::IncompleteFrame {
                needed: needed - buf.len(),
            });
        }
    };
    let payload_len =
        usize::try_from(payload_len).map_err(|_| Error::LengthOverflow(payload_len))?;

    let header_len = if masked { len_end + 4 } else { len_end };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| {
        [
            buf[len_end],
            buf[len_end + 1],
            buf[len_end + 2],
            buf[len_end + 3],
        ]
    });

    Ok(FrameHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// Read the payload length announced by the header at the front of `buf`.
///
/// Returns the length and the offset right after the length field, or
/// `None` if the extended length bytes have not arrived yet.
///
/// # Errors
///
/// Returns `Error::LengthOverflow` if a 64-bit length has its most
/// significant bit set (RFC 6455 Section 5.2).
pub(crate) fn announced_len(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    let Some(&byte1) = buf.get(1) else {
        return Ok(None);
    };
    match byte1 & 0x7F {
        len @ 0..=125 => Ok(Some((u64::from(len), 2))),
        126 => Ok(buf
            .get(2..4)
            .map(|b| (u64::from(u16::from_be_bytes([b[0], b[1]])), 4))),
        _ => {
            let Some(b) = buf.get(2..10) else {
                return Ok(None);
            };
            let len = u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
            if len >> 63 != 0 {
                return Err(Error::LengthOverflow(len));
            }
            Ok(Some((len, 10)))
        }
    }
}

/// Number of bytes a frame with `payload_len` payload bytes occupies on the wire.
#[must_use]
pub const fn encoded_len(payload_len: usize, masked: bool) -> usize {
    let extended_len_size = if payload_len <= 125 {
        0
    } else if payload_len <= 65535 {
        2
    } else {
        8
    };
    let mask_size = if masked { 4 } else { 0 };
    2 + extended_len_size + mask_size + payload_len
}

fn put_header(buf: &mut BytesMut, byte0: u8, payload_len: usize, mask: Option<[u8; 4]>) {
    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    buf.put_u8(byte0);
    if payload_len <= 125 {
        buf.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= 65535 {
        buf.put_u8(mask_bit | 126);
        buf.put_u16(payload_len as u16);
    } else {
        buf.put_u8(mask_bit | 127);
        buf.put_u64(payload_len as u64);
    }
    if let Some(key) = mask {
        buf.put_slice(&key);
    }
}

/// Append one final frame to `buf` and return the number of bytes written.
///
/// When `status` is given it is written as a big-endian `u16` in front of
/// `payload`, and counts towards the encoded length and the masking.
pub fn encode_frame(
    buf: &mut BytesMut,
    opcode: OpCode,
    payload: &[u8],
    status: Option<u16>,
    mask: Option<[u8; 4]>,
) -> usize {
    let status_len = if status.is_some() { 2 } else { 0 };
    let payload_len = status_len + payload.len();
    let start = buf.len();
    buf.reserve(encoded_len(payload_len, mask.is_some()));

    put_header(buf, FIN_BIT | opcode.as_u8(), payload_len, mask);
    let body = buf.len();
    if let Some(code) = status {
        buf.put_u16(code);
    }
    buf.put_slice(payload);
    if let Some(key) = mask {
        apply_mask_fast(&mut buf[body..], key);
    }
    buf.len() - start
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                    Masking key (if MASK set)                  |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame; without a status the payload is empty.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &[u8]) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason);
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Payload bytes (already unmasked for parsed frames).
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Status code carried by a Close frame, if any.
    #[must_use]
    pub fn close_status(&self) -> Option<u16> {
        if self.opcode != OpCode::Close {
            return None;
        }
        match self.payload.as_slice() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Parse a frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed; bytes past that
    /// point belong to the next frame. A masked frame is unmasked with its
    /// own key; whether masked frames are acceptable is the caller's call.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::InvalidOpcode` / `Error::ReservedOpcode`
    /// - `Error::LengthOverflow`
    #[inline]
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;

        let total_size = header
            .header_len
            .checked_add(header.payload_len)
            .ok_or(Error::LengthOverflow(header.payload_len as u64))?;

        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total_size].to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            payload,
        };

        Ok((frame, total_size))
    }

    /// Validate the frame according to RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set (no extensions are negotiated)
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }

        Ok(())
    }

    /// Append the frame to `buf`, masking the payload when `mask` is given.
    ///
    /// Honors `fin` and the RSV bits, unlike [`encode_frame`], which is the
    /// path used for outgoing client frames.
    pub fn encode(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) -> usize {
        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= FIN_BIT;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }

        let start = buf.len();
        buf.reserve(self.wire_size(mask.is_some()));
        put_header(buf, byte0, self.payload.len(), mask);
        let body = buf.len();
        buf.put_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask_fast(&mut buf[body..], key);
        }
        buf.len() - start
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        encoded_len(self.payload.len(), masked)
    }
}
