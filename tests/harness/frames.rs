//! Builders for server-to-client wire bytes (never masked).

use bytes::BytesMut;
use wss_engine::protocol::Frame;
use wss_engine::OpCode;

pub fn frame(fin: bool, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    Frame::new(fin, opcode, payload.to_vec()).encode(&mut buf, None);
    buf.to_vec()
}

pub fn text(text: &str) -> Vec<u8> {
    frame(true, OpCode::Text, text.as_bytes())
}

pub fn binary(data: &[u8]) -> Vec<u8> {
    frame(true, OpCode::Binary, data)
}

pub fn ping(payload: &[u8]) -> Vec<u8> {
    frame(true, OpCode::Ping, payload)
}

pub fn pong(payload: &[u8]) -> Vec<u8> {
    frame(true, OpCode::Pong, payload)
}

pub fn close(code: u16, reason: &str) -> Vec<u8> {
    let mut payload = code.to_be_bytes().to_vec();
    payload.extend_from_slice(reason.as_bytes());
    frame(true, OpCode::Close, &payload)
}

/// A server frame with the mask bit set.
pub fn masked_text(text: &str, key: [u8; 4]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    Frame::text(text).encode(&mut buf, Some(key));
    buf.to_vec()
}
