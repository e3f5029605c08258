//! Per-connection building blocks of the client.
//!
//! ## Connection Lifecycle
//!
//! 1. **Closed** - Initial state; also the state after any teardown
//! 2. **Connecting** - Transport connecting, upgrade in flight
//! 3. **Open** - Handshake done, messages flow both ways
//! 4. **ClosingLocal / ClosingRemote** - Close frame sent or received
//! 5. **Closed** - Transport down; a new connect may start over
//!
//! [`CloseNegotiator`] decides transitions, [`SendGate`] serializes
//! outgoing frames and [`ReceiveHub`] hands messages to blocking readers.

mod close;
mod gate;
mod hub;
mod state;

pub use close::{CloseAction, CloseNegotiator};
pub use gate::SendGate;
pub use hub::ReceiveHub;
pub use state::ConnectionState;
