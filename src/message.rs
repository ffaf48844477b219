//! Message assembler and protocol validator. Consumes decoded frames in
//! order, enforces fragmentation and opcode rules, reassembles application
//! messages, validates UTF-8 on text, and surfaces control-frame events
//! (ping/pong/close).
//!
//! A standalone, transport-agnostic type with no compression step. The
//! "non-Continuation data frame while a message is fragmented" and
//! "Continuation with no message in progress" checks enforce RFC 6455 §5.4's
//! fragmentation rules directly.

use crate::close::CloseCode;
use crate::error::Error;
use crate::frame::{parse_close_payload, Frame, OpCode};

/// A complete, reassembled application message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    pub fn as_binary(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }
}

/// One event the assembler can emit for a single inbound frame.
#[derive(Debug, Clone)]
pub enum AssemblerEvent {
    /// A fragment of a data message; `is_final` mirrors the frame's FIN bit.
    DataFragment {
        opcode: OpCode,
        payload: Vec<u8>,
        is_final: bool,
    },
    /// The final fragment completed a message; carries the fully assembled,
    /// validated payload.
    MessageComplete(Message),
    /// A Ping was received; the caller is expected to reply with a Pong
    /// carrying the identical payload per RFC 6455 §5.5.2.
    Ping(Vec<u8>),
    /// A Pong was received.
    Pong(Vec<u8>),
    /// A Close was received; `None` close info means the peer sent an empty
    /// close payload (no code/reason).
    Close(Option<(CloseCode, String)>),
}

/// Holds the in-progress fragmented message, if any.
#[derive(Debug, Default)]
struct AssemblyBuffer {
    current_message_opcode: Option<OpCode>,
    buffer: Vec<u8>,
}

impl AssemblyBuffer {
    fn is_fragmented(&self) -> bool {
        self.current_message_opcode.is_some()
    }

    fn reset(&mut self) {
        self.current_message_opcode = None;
        self.buffer.clear();
    }
}

/// Stateful protocol validator sitting between the frame decoder and the
/// application. One `MessageAssembler` per `Connection`.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    assembly: AssemblyBuffer,
    max_message_size: usize,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            assembly: AssemblyBuffer::default(),
            max_message_size,
        }
    }

    /// Feeds one decoded frame into the assembler. Control frames never touch
    /// fragmentation state: RFC 6455 §5.4 allows a control frame interleaved
    /// between data fragments, and it is processed immediately.
    pub fn accept(&mut self, frame: Frame) -> Result<AssemblerEvent, Error> {
        if frame.opcode.is_control() {
            return self.accept_control(frame);
        }
        self.accept_data(frame)
    }

    fn accept_control(&mut self, frame: Frame) -> Result<AssemblerEvent, Error> {
        match frame.opcode {
            OpCode::Ping => Ok(AssemblerEvent::Ping(frame.payload)),
            OpCode::Pong => Ok(AssemblerEvent::Pong(frame.payload)),
            OpCode::Close => {
                let info = match parse_close_payload(&frame.payload) {
                    Ok(info) => info,
                    // An invalid close code is itself a protocol error but the
                    // close handshake should still proceed — substitute
                    // ProtocolError.
                    Err(Error::InvalidCloseCode(_)) => {
                        Some((CloseCode::ProtocolError, String::new()))
                    }
                    Err(e) => return Err(e),
                };
                Ok(AssemblerEvent::Close(info))
            }
            _ => unreachable!("accept_control only called for control opcodes"),
        }
    }

    fn accept_data(&mut self, frame: Frame) -> Result<AssemblerEvent, Error> {
        let is_final = frame.fin;

        match frame.opcode {
            OpCode::Continuation => {
                if !self.assembly.is_fragmented() {
                    return Err(Error::InvalidContinuationFrame);
                }
            }
            OpCode::Text | OpCode::Binary => {
                if self.assembly.is_fragmented() {
                    return Err(Error::InvalidFrameFragmentation);
                }
            }
            _ => return Err(Error::InvalidOpcode),
        }

        let message_opcode = match frame.opcode {
            OpCode::Continuation => self
                .assembly
                .current_message_opcode
                .expect("checked above: fragmented implies Some"),
            other => other,
        };

        if !self.assembly.is_fragmented() {
            self.assembly.current_message_opcode = Some(message_opcode);
        }

        self.assembly.buffer.extend_from_slice(&frame.payload);
        if self.assembly.buffer.len() > self.max_message_size {
            self.assembly.reset();
            return Err(Error::MaxMessageSize);
        }

        let fragment_event = AssemblerEvent::DataFragment {
            opcode: message_opcode,
            payload: frame.payload,
            is_final,
        };

        if !is_final {
            return Ok(fragment_event);
        }

        let full = std::mem::take(&mut self.assembly.buffer);
        self.assembly.reset();

        let message = match message_opcode {
            OpCode::Text => {
                let text = String::from_utf8(full).map_err(|_| Error::InvalidUtf8)?;
                Message::Text(text)
            }
            OpCode::Binary => Message::Binary(full),
            _ => unreachable!("message_opcode is always Text or Binary"),
        };

        Ok(AssemblerEvent::MessageComplete(message))
    }
}

/// Splits a message's payload into frames no larger than `max_frame_size`:
/// the first frame carries the real opcode, subsequent frames use
/// `Continuation`, and the last has FIN=1. An empty message is still one
/// frame.
pub fn message_to_frames(message: Message, max_frame_size: usize) -> Vec<(OpCode, Vec<u8>, bool)> {
    let opcode = message.opcode();
    let payload = message.into_bytes();

    if payload.is_empty() {
        return vec![(opcode, payload, true)];
    }

    let mut frames: Vec<(OpCode, Vec<u8>, bool)> = payload
        .chunks(max_frame_size.max(1))
        .enumerate()
        .map(|(i, chunk)| {
            let op = if i == 0 { opcode } else { OpCode::Continuation };
            (op, chunk.to_vec(), false)
        })
        .collect();

    if let Some(last) = frames.last_mut() {
        last.2 = true;
    }
    frames
}
