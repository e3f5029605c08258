//! Frame opcodes as defined in RFC 6455 Section 5.2.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame (0x0), carries a later fragment of a message.
    Continuation = 0x0,
    /// Text frame (0x1), payload is UTF-8.
    Text = 0x1,
    /// Binary frame (0x2).
    Binary = 0x2,
    /// Close frame (0x8), optional status code and reason.
    Close = 0x8,
    /// Ping frame (0x9).
    Ping = 0x9,
    /// Pong frame (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Decode the low nibble of the first header byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for 0x3-0x7 and 0xB-0xF, and
    /// `Error::InvalidOpcode` for values that do not fit in four bits.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            0x3..=0x7 | 0xB..=0xF => Err(Error::ReservedOpcode(byte)),
            _ => Err(Error::InvalidOpcode(byte)),
        }
    }

    /// Raw nibble value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping and Pong.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Text and Binary open a new message; Continuation extends one.
    #[inline]
    #[must_use]
    pub const fn starts_message(self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        OpCode::from_u8(byte)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_wire_values() {
        for op in [
            OpCode::Continuation,
            OpCode::Text,
            OpCode::Binary,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::try_from(op.as_u8()).unwrap(), op);
        }
        assert_eq!(OpCode::Pong.as_u8(), 0xA);
    }

    #[test]
    fn test_opcode_reserved() {
        for reserved in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
            assert_eq!(OpCode::from_u8(reserved), Err(Error::ReservedOpcode(reserved)));
        }
        assert_eq!(OpCode::from_u8(0x10), Err(Error::InvalidOpcode(0x10)));
    }

    #[test]
    fn test_opcode_classes() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(!OpCode::Continuation.is_control());
        assert!(OpCode::Text.starts_message());
        assert!(OpCode::Binary.starts_message());
        assert!(!OpCode::Continuation.starts_message());
        assert!(!OpCode::Ping.starts_message());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Text.to_string(), "Text");
        assert_eq!(OpCode::Close.to_string(), "Close");
    }
}
