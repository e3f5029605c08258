//! Error types for the WebSocket client engine.
//!
//! This module defines all error conditions that can occur while framing,
//! decoding and driving a client connection, following RFC 6455 requirements.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Context attached to protocol faults surfaced through the error channel.
pub const WS_ERROR_CONTEXT: &str = "WebSocket error";

/// Context attached to faults reported by the underlying transport.
pub const TRANSPORT_ERROR_CONTEXT: &str = "Transport error";

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text message or close reason.
    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// The 64-bit length field has its most significant bit set or does not
    /// fit the platform's address space.
    #[error("Payload length overflow: {0}")]
    LengthOverflow(u64),

    /// Connection is not open for sending.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// The server's upgrade response failed validation.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Close frame payload of exactly one byte.
    #[error("Invalid close payload")]
    InvalidClosePayload,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Masked server frame while masked frames are not accepted.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Generic fault-class error delivered to the client's error channel.
    #[error("{context}: {message}")]
    Fault {
        /// Where the fault came from.
        context: &'static str,
        /// Description of the fault.
        message: String,
    },
}

impl Error {
    /// Wrap a description into a WebSocket fault.
    #[must_use]
    pub fn ws_fault(message: impl Into<String>) -> Self {
        Error::Fault {
            context: WS_ERROR_CONTEXT,
            message: message.into(),
        }
    }

    /// Wrap a description into a transport fault.
    #[must_use]
    pub fn transport_fault(message: impl Into<String>) -> Self {
        Error::Fault {
            context: TRANSPORT_ERROR_CONTEXT,
            message: message.into(),
        }
    }

    /// Close status the engine sends to the peer before tearing down the
    /// connection because of this error.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Error::InvalidUtf8 => 1007,
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => 1009,
            _ => 1002,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
