//! Configuration and limits for client connections.

use std::time::Duration;

/// Limits applied to frames and messages received from the server.
///
/// Outgoing frames are never capped here; their size is bounded only by the
/// transport and available memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest payload a single server frame may announce.
    ///
    /// Default: 16 MiB
    pub max_frame_size: usize,

    /// Largest message after reassembly of all its fragments.
    ///
    /// Default: 64 MiB
    pub max_message_size: usize,

    /// Most frames one fragmented message may span.
    ///
    /// Default: 128
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            max_fragment_count: 128,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_message_size: usize, max_fragment_count: usize) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
        }
    }

    /// Tight limits for memory-constrained clients: 64 KiB frames, 256 KiB
    /// messages, 16 fragments.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
        }
    }

    /// No limits at all. Only for servers that are fully trusted.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_frame_size: usize::MAX,
            max_message_size: usize::MAX,
            max_fragment_count: usize::MAX,
        }
    }

    /// Reject a reassembled message that would grow past `max_message_size`.
    ///
    /// # Errors
    ///
    /// `Error::MessageTooLarge` carrying the offending size.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        let max = self.max_message_size;
        if size <= max {
            return Ok(());
        }
        Err(crate::Error::MessageTooLarge { size, max })
    }

    /// Reject a frame by the length its header announces, before any of the
    /// payload is buffered.
    ///
    /// # Errors
    ///
    /// `Error::FrameTooLarge` carrying the announced length.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        let max = self.max_frame_size;
        // usize never exceeds u64 on supported targets.
        if size <= max as u64 {
            return Ok(());
        }
        Err(crate::Error::FrameTooLarge { size, max })
    }

    /// Reject a message split into more than `max_fragment_count` frames.
    ///
    /// # Errors
    ///
    /// `Error::TooManyFragments` carrying the fragment count.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        let max = self.max_fragment_count;
        if count <= max {
            return Ok(());
        }
        Err(crate::Error::TooManyFragments { count, max })
    }
}

/// Default bounds for the blocking operations of a client.
///
/// A timeout passed explicitly to a `*_timeout` call or `receive_*` always
/// takes precedence over these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time a synchronous `connect` waits for the handshake.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,

    /// Bound handed to the transport by synchronous sends.
    ///
    /// Default: 60 seconds
    pub send: Duration,

    /// Maximum time a blocking receive waits for a message.
    ///
    /// Default: 60 seconds
    pub receive: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
            send: Duration::from_secs(60),
            receive: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, send: Duration, receive: Duration) -> Self {
        Self {
            handshake,
            send,
            receive,
        }
    }
}

/// Client connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inbound resource limits.
    pub limits: Limits,

    /// Accept masked frames from the server.
    ///
    /// RFC 6455 forbids servers from masking. When `false` a masked frame is
    /// a protocol error; when `true` it is unmasked with its own key.
    ///
    /// Default: false
    pub accept_masked_frames: bool,

    /// Answer every received Ping with a Pong carrying the same payload.
    ///
    /// Default: true
    pub auto_pong: bool,

    /// Initial capacity of the inbound decode buffer (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Initial capacity of the shared outbound frame buffer (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,

    /// Timeout configuration.
    ///
    /// If `None`, blocking operations wait without bound unless a timeout
    /// is passed explicitly.
    /// Default: None
    pub timeouts: Option<Timeouts>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            accept_masked_frames: false,
            auto_pong: true,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            timeouts: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration preset for a client connection.
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Tolerate masked frames from the server.
    #[must_use]
    pub const fn with_accept_masked_frames(mut self, accept: bool) -> Self {
        self.accept_masked_frames = accept;
        self
    }

    /// Enable or disable the automatic Pong reply.
    #[must_use]
    pub const fn with_auto_pong(mut self, enabled: bool) -> Self {
        self.auto_pong = enabled;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub(crate) fn handshake_timeout(&self) -> Option<Duration> {
        self.timeouts.as_ref().map(|t| t.handshake)
    }

    pub(crate) fn send_timeout(&self) -> Option<Duration> {
        self.timeouts.as_ref().map(|t| t.send)
    }

    pub(crate) fn receive_timeout(&self) -> Option<Duration> {
        self.timeouts.as_ref().map(|t| t.receive)
    }
}
