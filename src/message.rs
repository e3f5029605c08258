//! Application messages and close codes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// Invalid payload (1007). Non-UTF-8 data in a text message.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code (3000-4999 for applications, 1012-1014 registered).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// Reserved codes per RFC 6455 Section 7.4.1:
    /// - 1004: Reserved
    /// - 1005: No Status Received
    /// - 1006: Abnormal Closure
    /// - 1015: TLS Handshake
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }

    /// Whether this code may appear in a Close frame at all: the defined and
    /// registered codes 1000-1003 and 1007-1014, or an application code in
    /// 3000-4999.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

/// Close frame payload: status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Parse a Close frame payload.
    ///
    /// An empty payload carries no status and yields `None`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidClosePayload` for a one-byte payload
    /// - `Error::InvalidCloseCode` for a status that must not be on the wire
    /// - `Error::InvalidUtf8` if the reason is not valid UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::InvalidClosePayload),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_allowed() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(&payload[2..])?;
                Ok(Some(Self::new(code, reason)))
            }
        }
    }
}

/// A complete application message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Borrow the raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Consume into text. Binary payloads are converted lossily.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Message::Text(s) => s,
            Message::Binary(data) => match String::from_utf8(data) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
        }
    }

    /// Consume into raw bytes.
    #[must_use]
    pub fn into_binary(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the binary content, if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Message::Binary(data) => Some(data),
            Message::Text(_) => None,
        }
    }
}
