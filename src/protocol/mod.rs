//! WebSocket protocol core for the client side (RFC 6455).

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::MessageAssembler;
pub use decoder::{FrameDecoder, Inbound};
pub use frame::{Frame, encode_frame, encoded_len};
pub use handshake::{ClientKey, UpgradeResponse, WS_GUID, compute_accept_key};
pub use mask::{MaskGenerator, apply_mask, apply_mask_fast};
pub use opcode::OpCode;
