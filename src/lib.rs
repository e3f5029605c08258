//! # wss-engine - WebSocket client protocol engine
//!
//! `wss-engine` implements the client side of RFC 6455 on top of a secure
//! byte-stream transport supplied by the application.
//!
//! ## Features
//!
//! - **Frame codec** with all three length forms and per-frame masking
//! - **Stream decoding** across arbitrary delivery boundaries, with
//!   fragment reassembly and UTF-8 validation
//! - **Close handshake** with status echo and transport teardown
//! - **Sync and async sends** serialized so frames never interleave
//! - **Pull or push delivery** via blocking `receive_*` or a message handler
//! - **Resource limits** on inbound frames and messages
//!
//! TCP, TLS and the HTTP Upgrade request live behind the [`Transport`]
//! trait; the engine validates the upgrade response and takes over once
//! the stream is upgraded.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wss_engine::{Config, WssClient};
//!
//! let client = WssClient::new(transport, Config::client());
//! client.connect()?;
//! client.send_text("Hello")?;
//! let reply = client.receive_text(None);
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod transport;

pub use client::WssClient;
pub use config::{Config, Limits, Timeouts};
pub use connection::ConnectionState;
pub use error::{Error, Result};
pub use handler::{Handler, MessageHandler};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{ClientKey, OpCode, UpgradeResponse, WS_GUID, compute_accept_key};
pub use transport::{Transport, TransportEvents};
