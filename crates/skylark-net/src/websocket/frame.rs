//! WebSocket frame codec (RFC 6455 section 5).
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |                   Masking-key, if MASK set                    |
//! +-------------------------------+-------------------------------+
//! |                          Payload Data                         |
//! +---------------------------------------------------------------+
//! ```
//!
//! Client frames are always masked on the way out. Incoming frames are
//! unmasked when the MASK bit is set, so [`decode`] accepts anything
//! [`encode`] produces.

use std::fmt;

use rand::RngCore;

use super::message::{CloseCode, CloseReason};
use crate::error::{NetworkError, Result};

const FIN_BIT: u8 = 0x80;
const RSV1_BIT: u8 = 0x40;
const RSV2_BIT: u8 = 0x20;
const RSV3_BIT: u8 = 0x10;
const OPCODE_MASK: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_MASK: u8 = 0x7F;

/// Length codes in the second header byte.
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Frame opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Parse a 4-bit opcode. Reserved values yield `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    /// The wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Control opcodes are Close, Ping and Pong.
    pub fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }
}

/// A single WebSocket frame with an unmasked payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A final frame with the given opcode and payload.
    pub fn new(opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Opcode::Text, text.into().into_bytes())
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Opcode::Binary, data)
    }

    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Opcode::Ping, data)
    }

    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Opcode::Pong, data)
    }

    /// A Close frame with no status code.
    pub fn close() -> Self {
        Self::new(Opcode::Close, Vec::new())
    }

    /// A Close frame carrying a status code and optional reason text.
    pub fn close_with(reason: &CloseReason) -> Self {
        let text = reason.reason.as_deref().unwrap_or("");
        let mut payload = Vec::with_capacity(2 + text.len());
        payload.extend_from_slice(&reason.code.as_u16().to_be_bytes());
        payload.extend_from_slice(text.as_bytes());
        Self::new(Opcode::Close, payload)
    }

    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Interpret the payload of a Close frame.
    ///
    /// Returns `None` for other opcodes and for a Close frame without a
    /// status code.
    pub fn close_reason(&self) -> Option<CloseReason> {
        if self.opcode != Opcode::Close || self.payload.len() < 2 {
            return None;
        }
        let code = CloseCode::from_u16(u16::from_be_bytes([self.payload[0], self.payload[1]]));
        let text = String::from_utf8_lossy(&self.payload[2..]);
        Some(if text.is_empty() {
            CloseReason::new(code)
        } else {
            CloseReason::with_reason(code, text)
        })
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn text_payload(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame{{fin={}, rsv1={}, rsv2={}, rsv3={}, opcode=0x{:X}, payload={}}}",
            self.fin,
            self.rsv1,
            self.rsv2,
            self.rsv3,
            self.opcode.as_u8(),
            String::from_utf8_lossy(&self.payload)
        )
    }
}

/// Result of decoding from the front of a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A whole frame was present; `consumed` bytes belong to it.
    Complete { frame: Frame, consumed: usize },
    /// More bytes are needed before a frame can be produced.
    Incomplete,
}

/// XOR `data` with the 4-byte masking key. Applying it twice is a no-op.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Encode a frame as a masked client frame with a random masking key.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut key = [0u8; 4];
    rand::rngs::OsRng.fill_bytes(&mut key);
    encode_with_mask(frame, key)
}

/// Encode a frame as a masked client frame with the given masking key.
pub fn encode_with_mask(frame: &Frame, key: [u8; 4]) -> Vec<u8> {
    let len = frame.payload.len();
    let mut out = Vec::with_capacity(14 + len);

    let mut first = frame.opcode.as_u8();
    if frame.fin {
        first |= FIN_BIT;
    }
    if frame.rsv1 {
        first |= RSV1_BIT;
    }
    if frame.rsv2 {
        first |= RSV2_BIT;
    }
    if frame.rsv3 {
        first |= RSV3_BIT;
    }
    out.push(first);

    if len <= 125 {
        out.push(MASK_BIT | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(MASK_BIT | LEN_16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(MASK_BIT | LEN_64);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(&key);
    let start = out.len();
    out.extend_from_slice(&frame.payload);
    apply_mask(&mut out[start..], key);
    out
}

/// Decode one frame from the front of `buf`.
///
/// Returns [`Decoded::Incomplete`] when the header, extended length, masking
/// key or payload is not fully present yet. Reserved opcodes are a protocol
/// error.
pub fn decode(buf: &[u8]) -> Result<Decoded> {
    if buf.len() < 2 {
        return Ok(Decoded::Incomplete);
    }

    let first = buf[0];
    let second = buf[1];
    let opcode = Opcode::from_u8(first & OPCODE_MASK).ok_or_else(|| {
        NetworkError::Protocol(format!("reserved opcode 0x{:X}", first & OPCODE_MASK))
    })?;
    let masked = second & MASK_BIT != 0;

    let mut pos = 2;
    let len = match second & LEN_MASK {
        LEN_16 => {
            let Some(bytes) = buf.get(pos..pos + 2) else {
                return Ok(Decoded::Incomplete);
            };
            pos += 2;
            u16::from_be_bytes([bytes[0], bytes[1]]) as u64
        }
        LEN_64 => {
            let Some(bytes) = buf.get(pos..pos + 8) else {
                return Ok(Decoded::Incomplete);
            };
            pos += 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            u64::from_be_bytes(raw)
        }
        short => short as u64,
    };
    let len = usize::try_from(len)
        .map_err(|_| NetworkError::Protocol(format!("payload length {len} is too large")))?;

    let key = if masked {
        let Some(bytes) = buf.get(pos..pos + 4) else {
            return Ok(Decoded::Incomplete);
        };
        pos += 4;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    } else {
        None
    };

    let Some(end) = pos.checked_add(len).filter(|&end| end <= buf.len()) else {
        return Ok(Decoded::Incomplete);
    };
    let mut payload = buf[pos..end].to_vec();
    if let Some(key) = key {
        apply_mask(&mut payload, key);
    }

    Ok(Decoded::Complete {
        frame: Frame {
            fin: first & FIN_BIT != 0,
            rsv1: first & RSV1_BIT != 0,
            rsv2: first & RSV2_BIT != 0,
            rsv3: first & RSV3_BIT != 0,
            opcode,
            payload,
        },
        consumed: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_complete(buf: &[u8]) -> (Frame, usize) {
        match decode(buf).unwrap() {
            Decoded::Complete { frame, consumed } => (frame, consumed),
            Decoded::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn test_round_trip_at_length_boundaries() {
        for len in [0usize, 1, 125, 126, 65535, 65536] {
            let frame = Frame::binary(vec![0xA5; len]);
            let encoded = encode(&frame);
            let (decoded, consumed) = decode_complete(&encoded);
            assert_eq!(decoded, frame, "length {len}");
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_length_encodings() {
        let key = [0, 0, 0, 0];
        assert_eq!(encode_with_mask(&Frame::binary(vec![0; 125]), key)[1], 0x80 | 125);

        let medium = encode_with_mask(&Frame::binary(vec![0; 126]), key);
        assert_eq!(medium[1], 0x80 | 126);
        assert_eq!(&medium[2..4], &[0x00, 0x7E]);

        let large = encode_with_mask(&Frame::binary(vec![0; 65536]), key);
        assert_eq!(large[1], 0x80 | 127);
        assert_eq!(&large[2..10], &[0, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_encode_masks_payload() {
        let key = [0x37, 0xFA, 0x21, 0x3D];
        let encoded = encode_with_mask(&Frame::text("Hello"), key);
        // RFC 6455 section 5.7, masked "Hello".
        assert_eq!(
            encoded,
            [0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58]
        );
    }

    #[test]
    fn test_decode_unmasked_server_frame() {
        let (frame, consumed) = decode_complete(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
        assert_eq!(consumed, 7);
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.text_payload(), Some("Hello"));
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = vec![0x89, 0x00];
        buf.extend_from_slice(&[0x81, 0x01, b'x']);
        let (frame, consumed) = decode_complete(&buf);
        assert_eq!(frame.opcode, Opcode::Ping);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode(&Frame::binary(vec![1; 300]));
        for cut in [0, 1, 3, 7, encoded.len() - 1] {
            assert_eq!(decode(&encoded[..cut]).unwrap(), Decoded::Incomplete, "cut {cut}");
        }
    }

    #[test]
    fn test_decode_rejects_reserved_opcodes() {
        for opcode in [0x3u8, 0x7, 0xB, 0xF] {
            assert!(matches!(
                decode(&[0x80 | opcode, 0x00]),
                Err(NetworkError::Protocol(_))
            ));
        }
    }

    #[test]
    fn test_rsv_bits_round_trip() {
        let mut frame = Frame::text("x");
        frame.fin = false;
        frame.rsv1 = true;
        frame.rsv3 = true;
        let encoded = encode_with_mask(&frame, [1, 2, 3, 4]);
        assert_eq!(encoded[0], 0x40 | 0x10 | 0x01);
        assert_eq!(decode_complete(&encoded).0, frame);
    }

    #[test]
    fn test_apply_mask_is_symmetric() {
        let key = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut data = b"symmetric masking".to_vec();
        apply_mask(&mut data, key);
        assert_ne!(data, b"symmetric masking");
        apply_mask(&mut data, key);
        assert_eq!(data, b"symmetric masking");
    }

    #[test]
    fn test_close_payloads() {
        assert!(Frame::close().payload.is_empty());
        assert_eq!(Frame::close().close_reason(), None);

        let frame = Frame::close_with(&CloseReason::with_reason(CloseCode::Away, "bye"));
        assert_eq!(frame.payload, [0x03, 0xE9, b'b', b'y', b'e']);
        assert_eq!(
            frame.close_reason(),
            Some(CloseReason::with_reason(CloseCode::Away, "bye"))
        );
        assert_eq!(Frame::text("x").close_reason(), None);
    }

    #[test]
    fn test_control_opcodes() {
        assert!(Frame::ping("").is_control());
        assert!(Frame::pong("").is_control());
        assert!(Frame::close().is_control());
        assert!(!Frame::text("").is_control());
        assert!(!Frame::new(Opcode::Continuation, "").is_control());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Frame::text("hi").to_string(),
            "Frame{fin=true, rsv1=false, rsv2=false, rsv3=false, opcode=0x1, payload=hi}"
        );
    }
}
