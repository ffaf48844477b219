//! The WebSocket frame codec: a pure encoder and an incremental,
//! buffer-driven decoder. The decoder never performs I/O itself — it
//! consumes whatever bytes are already in a buffer and reports `NeedMore`
//! instead of blocking on a socket read, so one connection's frame
//! boundaries never stall another's.

use crate::close::CloseCode;
use crate::error::Error;
use crate::mask::apply_mask;
use bytes::{Buf, BytesMut};

/// Maximum payload length this decoder will plan to read in one frame,
/// independent of any `WebSocketConfig::max_frame_size` the caller enforces
/// earlier. Bounds the `NeedMore` hint so a maliciously large length field
/// can't be used to request an unbounded allocation hint.
pub const MAX_PAYLOAD_SIZE: u64 = 1 << 40; // 1 TiB — a sanity backstop, not a protocol limit.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(byte) => byte,
        }
    }

    /// Control frames (Close, Ping, Pong) per RFC 6455 §5.5: opcode >= 0x8.
    pub fn is_control(self) -> bool {
        self.as_u8() >= 0x8
    }

    /// Opcodes 0x3-0x7 and 0xB-0xF are reserved for future non-control and
    /// control frames respectively and must never appear on the wire today.
    pub fn is_reserved(self) -> bool {
        matches!(self, OpCode::Reserved(_))
    }
}

/// A fully decoded WebSocket frame. Immutable once constructed — callers that
/// need to mutate a payload (e.g. unmasking) do so before building the
/// `Frame`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask_key: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask_key: None,
            payload,
        }
    }

    pub fn masked(self) -> bool {
        self.mask_key.is_some()
    }
}

/// Encodes a single frame. `mask_key` is `Some` for
/// client-originated frames (RFC 6455 §5.1 mandates client->server masking)
/// and `None` for server-originated ones.
pub fn encode_frame(opcode: OpCode, payload: &[u8], mask_key: Option<[u8; 4]>, fin: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);

    let first_byte = (fin as u8) << 7 | opcode.as_u8();
    out.push(first_byte);

    let len = payload.len();
    let mask_bit = if mask_key.is_some() { 0x80 } else { 0x00 };

    if len <= 125 {
        out.push(mask_bit | len as u8);
    } else if len <= 0xFFFF {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if let Some(key) = mask_key {
        out.extend_from_slice(&key);
        let mut masked_payload = payload.to_vec();
        apply_mask(&mut masked_payload, key);
        out.extend_from_slice(&masked_payload);
    } else {
        out.extend_from_slice(payload);
    }

    out
}

/// Result of attempting to decode one frame from a buffer.
pub enum DecodeOutcome {
    Frame(Frame),
    /// Not enough bytes buffered yet; caller should read at least
    /// `additional` more bytes and retry. `additional` is a hint, not an
    /// exact requirement — retrying with any number of extra bytes is safe.
    NeedMore(usize),
}

/// Incremental frame decoder. Holds no buffer itself — the caller owns a
/// `BytesMut` read buffer and calls `decode` each time more bytes arrive,
/// looping until it gets `NeedMore` back. `decode` never blocks and never
/// performs I/O; see spec §9 and module docs above.
#[derive(Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one frame from the front of `buf`. On success, the
    /// consumed bytes are advanced out of `buf`. On `NeedMore`, `buf` is left
    /// untouched so the caller can append more bytes and retry.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<DecodeOutcome, Error> {
        if buf.len() < 2 {
            return Ok(DecodeOutcome::NeedMore(2 - buf.len()));
        }

        let b0 = buf[0];
        let b1 = buf[1];

        let fin = b0 & 0b1000_0000 != 0;
        let rsv1 = b0 & 0b0100_0000 != 0;
        let rsv2 = b0 & 0b0010_0000 != 0;
        let rsv3 = b0 & 0b0001_0000 != 0;
        let opcode = OpCode::from_u8(b0 & 0b0000_1111);

        if rsv1 || rsv2 || rsv3 {
            return Err(Error::RSVNotZero);
        }
        if opcode.is_reserved() {
            return Err(Error::InvalidOpcode);
        }
        if opcode.is_control() && !fin {
            return Err(Error::ControlFramesFragmented);
        }

        let masked = b1 & 0b1000_0000 != 0;
        let len_field = b1 & 0b0111_1111;

        let mut header_len = 2usize;
        let payload_len: u64;

        match len_field {
            0..=125 => {
                payload_len = len_field as u64;
            }
            126 => {
                header_len += 2;
                if buf.len() < header_len {
                    return Ok(DecodeOutcome::NeedMore(header_len - buf.len()));
                }
                payload_len = u16::from_be_bytes([buf[2], buf[3]]) as u64;
            }
            127 => {
                header_len += 8;
                if buf.len() < header_len {
                    return Ok(DecodeOutcome::NeedMore(header_len - buf.len()));
                }
                let mut be = [0u8; 8];
                be.copy_from_slice(&buf[2..10]);
                let raw = u64::from_be_bytes(be);
                // RFC 6455 §5.2: the most significant bit of the 64-bit length
                // must be zero.
                if raw & (1 << 63) != 0 {
                    return Err(Error::MaxFrameSize);
                }
                payload_len = raw;
            }
            _ => unreachable!("7-bit field"),
        }

        if opcode.is_control() && payload_len > 125 {
            return Err(Error::ControlFramePayloadSize);
        }
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(Error::MaxFrameSize);
        }

        let mask_header_len = if masked { 4 } else { 0 };
        let total_header_len = header_len + mask_header_len;

        if buf.len() < total_header_len {
            return Ok(DecodeOutcome::NeedMore(total_header_len - buf.len()));
        }

        let total_len = total_header_len + payload_len as usize;
        if buf.len() < total_len {
            return Ok(DecodeOutcome::NeedMore(total_len - buf.len()));
        }

        buf.advance(header_len);
        let mask_key = if masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[..4]);
            buf.advance(4);
            Some(key)
        } else {
            None
        };

        let mut payload = buf[..payload_len as usize].to_vec();
        buf.advance(payload_len as usize);

        if let Some(key) = mask_key {
            apply_mask(&mut payload, key);
        }

        Ok(DecodeOutcome::Frame(Frame {
            fin,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            mask_key,
            payload,
        }))
    }
}

/// Reads a close frame's payload into an optional `(code, reason)` pair per
/// spec §4.4: a payload shorter than 2 bytes carries no code; a payload with
/// an out-of-range code is treated as `ProtocolError` by the caller.
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<(CloseCode, String)>, Error> {
    if payload.is_empty() {
        return Ok(None);
    }
    if payload.len() < 2 {
        return Err(Error::ControlFramePayloadSize);
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    if !CloseCode::is_valid_on_wire(code) {
        return Err(Error::InvalidCloseCode(code));
    }
    let reason = String::from_utf8(payload[2..].to_vec()).map_err(|_| Error::InvalidUtf8)?;
    Ok(Some((CloseCode::from_u16(code), reason)))
}

/// Extension hook (spec §9 open question): a per-direction transform applied
/// between the frame codec and the message assembler. No extension is
/// negotiated or shipped in this crate (spec.md Non-goals exclude
/// permessage-deflate); this trait exists solely so a future extension can be
/// wired in at a single, well-defined seam without touching the codec or the
/// assembler.
pub trait FrameTransform: Send {
    fn encode(&mut self, payload: Vec<u8>) -> Result<Vec<u8>, Error>;
    fn decode(&mut self, payload: Vec<u8>) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(mut bytes: BytesMut) -> Frame {
        let mut decoder = FrameDecoder::new();
        loop {
            match decoder.decode(&mut bytes).unwrap() {
                DecodeOutcome::Frame(frame) => return frame,
                DecodeOutcome::NeedMore(_) => panic!("decoder ran out of bytes unexpectedly"),
            }
        }
    }

    #[test]
    fn round_trip_unmasked_text() {
        let payload = b"Hello world!".to_vec();
        let encoded = encode_frame(OpCode::Text, &payload, None, true);
        let frame = decode_all(BytesMut::from(&encoded[..]));
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload, payload);
        assert!(frame.mask_key.is_none());
    }

    #[test]
    fn round_trip_masked_binary() {
        let payload = vec![0x00, 0x01, 0x02, 0xFF, 0xAB, 0xCD, 0xEF];
        let key = [0x11, 0x22, 0x33, 0x44];
        let encoded = encode_frame(OpCode::Binary, &payload, Some(key), true);
        let frame = decode_all(BytesMut::from(&encoded[..]));
        assert_eq!(frame.opcode, OpCode::Binary);
        assert_eq!(frame.payload, payload);
        assert_eq!(frame.mask_key, Some(key));
    }

    #[test]
    fn round_trip_large_payload_uses_64_bit_length() {
        let payload = vec![0x42u8; 70_000];
        let encoded = encode_frame(OpCode::Binary, &payload, None, true);
        assert_eq!(encoded[1], 127);
        let frame = decode_all(BytesMut::from(&encoded[..]));
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn round_trip_medium_payload_uses_16_bit_length() {
        let payload = vec![0x07u8; 500];
        let encoded = encode_frame(OpCode::Text, &payload, None, true);
        assert_eq!(encoded[1], 126);
        let frame = decode_all(BytesMut::from(&encoded[..]));
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn decoder_asks_for_more_bytes_incrementally() {
        let payload = b"fragmented delivery".to_vec();
        let encoded = encode_frame(OpCode::Text, &payload, None, true);

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();

        // Feed one byte at a time; every call but the last should ask for more.
        for (i, byte) in encoded.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            match decoder.decode(&mut buf).unwrap() {
                DecodeOutcome::Frame(frame) => {
                    assert_eq!(i, encoded.len() - 1);
                    assert_eq!(frame.payload, payload);
                    return;
                }
                DecodeOutcome::NeedMore(_) => continue,
            }
        }
        panic!("decoder never produced a frame");
    }

    #[test]
    fn rejects_nonzero_rsv_bits() {
        let mut encoded = encode_frame(OpCode::Text, b"hi", None, true);
        encoded[0] |= 0b0100_0000; // set RSV1
        let mut buf = BytesMut::from(&encoded[..]);
        let err = FrameDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::RSVNotZero));
    }

    #[test]
    fn rejects_reserved_opcode() {
        let mut encoded = encode_frame(OpCode::Text, b"hi", None, true);
        encoded[0] = (encoded[0] & 0b1111_0000) | 0x3; // reserved non-control opcode
        let mut buf = BytesMut::from(&encoded[..]);
        let err = FrameDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidOpcode));
    }

    #[test]
    fn rejects_oversized_control_frame() {
        let payload = vec![0u8; 200];
        let encoded = encode_frame(OpCode::Ping, &payload, None, true);
        let mut buf = BytesMut::from(&encoded[..]);
        let err = FrameDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::ControlFramePayloadSize));
    }

    #[test]
    fn rejects_fragmented_control_frame() {
        let encoded = encode_frame(OpCode::Ping, b"", None, false);
        let mut buf = BytesMut::from(&encoded[..]);
        let err = FrameDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::ControlFramesFragmented));
    }

    #[test]
    fn masking_round_trips_across_many_lengths_and_keys() {
        for len in [0usize, 1, 2, 3, 4, 5, 125, 126, 127, 1000] {
            for key in [[0u8, 0, 0, 0], [1, 2, 3, 4], [255, 0, 255, 0]] {
                let payload: Vec<u8> = (0..len as u32).map(|i| (i % 256) as u8).collect();
                let encoded = encode_frame(OpCode::Binary, &payload, Some(key), true);
                let frame = decode_all(BytesMut::from(&encoded[..]));
                assert_eq!(frame.payload, payload, "len={len} key={key:?}");
            }
        }
    }

    #[test]
    fn close_payload_round_trips_code_and_reason() {
        let parsed = parse_close_payload(&[0x03, 0xE8, b'b', b'y', b'e']).unwrap();
        let (code, reason) = parsed.unwrap();
        assert_eq!(code.as_u16(), 1000);
        assert_eq!(reason, "bye");
    }

    #[test]
    fn close_payload_rejects_invalid_code() {
        // 1005 ("no status received") is reserved for local use only.
        let err = parse_close_payload(&[0x03, 0xED]).unwrap_err();
        assert!(matches!(err, Error::InvalidCloseCode(1005)));
    }

    #[test]
    fn empty_close_payload_is_none() {
        assert!(parse_close_payload(&[]).unwrap().is_none());
    }
}
