//! Reassembly of fragmented messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Accumulates the fragments of one data message.
///
/// A message starts with a Text or Binary frame and is extended by
/// Continuation frames until one of them has FIN set. Control frames may be
/// interleaved by the server and are not seen here.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns the complete message when the frame has FIN set.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing pending,
    ///   a new Text/Binary frame while a message is pending, or a control frame
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` on limit breaches
    /// - `Error::InvalidUtf8` if a completed Text message is not UTF-8
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (op, None) if op.starts_message() => self.opcode = Some(op),
            (op, Some(_)) if op.starts_message() => {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (op, _) => {
                return Err(Error::ProtocolViolation(format!(
                    "{op} frame is not part of a message"
                )));
            }
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        let opcode = self.opcode.take();
        self.fragment_count = 0;
        match opcode {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(Message::Text(text)))
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }

    /// Whether a fragmented message is pending.
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Drop any partially received message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_limits() -> Limits {
        Limits::new(1024, 100, 3)
    }

    #[test]
    fn test_single_frame_message() {
        let mut assembler = MessageAssembler::new(Limits::default());
        let msg = assembler.push(Frame::text(b"Hello".to_vec())).unwrap();
        assert_eq!(msg, Some(Message::text("Hello")));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_fragmented_message() {
        let mut assembler = MessageAssembler::new(Limits::default());

        let first = Frame::new(false, OpCode::Binary, vec![1, 2]);
        assert!(assembler.push(first).unwrap().is_none());
        assert!(assembler.is_assembling());

        let middle = Frame::new(false, OpCode::Continuation, vec![3, 4]);
        assert!(assembler.push(middle).unwrap().is_none());

        let last = Frame::new(true, OpCode::Continuation, vec![5, 6]);
        let msg = assembler.push(last).unwrap();
        assert_eq!(msg, Some(Message::binary(vec![1, 2, 3, 4, 5, 6])));
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_text_split_inside_code_point() {
        let mut assembler = MessageAssembler::new(Limits::default());
        let first = Frame::new(false, OpCode::Text, vec![0xf0, 0x9f]);
        assert!(assembler.push(first).unwrap().is_none());

        let last = Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]);
        let msg = assembler.push(last).unwrap().unwrap();
        assert_eq!(msg.as_text(), Some("\u{1f389}"));
    }

    #[test]
    fn test_invalid_utf8_text() {
        let mut assembler = MessageAssembler::new(Limits::default());
        let frame = Frame::new(true, OpCode::Text, vec![0x80, 0x81]);
        assert_eq!(assembler.push(frame), Err(Error::InvalidUtf8));
    }

    #[test]
    fn test_continuation_without_start_fails() {
        let mut assembler = MessageAssembler::new(Limits::default());
        let frame = Frame::new(true, OpCode::Continuation, b"data".to_vec());
        assert!(matches!(
            assembler.push(frame),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_new_message_while_pending_fails() {
        let mut assembler = MessageAssembler::new(Limits::default());
        assembler
            .push(Frame::new(false, OpCode::Text, b"first".to_vec()))
            .unwrap();
        let result = assembler.push(Frame::text(b"second".to_vec()));
        assert!(matches!(result, Err(Error::ProtocolViolation(_))));
    }

    #[test]
    fn test_control_frame_rejected() {
        let mut assembler = MessageAssembler::new(Limits::default());
        assert!(matches!(
            assembler.push(Frame::ping(vec![])),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_max_message_size_exceeded() {
        let mut assembler = MessageAssembler::new(small_limits());
        let result = assembler.push(Frame::binary(vec![0u8; 150]));
        assert!(matches!(result, Err(Error::MessageTooLarge { .. })));
    }

    #[test]
    fn test_max_fragment_count_exceeded() {
        let mut assembler = MessageAssembler::new(small_limits());
        assert!(assembler.push(Frame::new(false, OpCode::Binary, vec![1])).is_ok());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![2])).is_ok());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![3])).is_ok());

        let result = assembler.push(Frame::new(true, OpCode::Continuation, vec![4]));
        assert!(matches!(result, Err(Error::TooManyFragments { .. })));
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut assembler = MessageAssembler::new(Limits::default());
        assembler
            .push(Frame::new(false, OpCode::Text, b"partial".to_vec()))
            .unwrap();
        assembler.reset();
        assert!(!assembler.is_assembling());

        let msg = assembler.push(Frame::text(b"fresh".to_vec())).unwrap();
        assert_eq!(msg, Some(Message::text("fresh")));
    }
}
