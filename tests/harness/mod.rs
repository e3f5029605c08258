//! Test harness for driving a client without a network.
//!
//! [`MockTransport`] records every byte the client writes and lets a test
//! play the server: complete or reject the handshake, deliver bytes, drop
//! the connection. [`frames`] builds unmasked server frames and
//! [`Recorder`] captures handler events.

#![allow(dead_code, unused_imports)]

pub mod frames;
mod recorder;
mod transport;

pub use recorder::{Event, Recorder};
pub use transport::{HandshakeMode, MockTransport};
