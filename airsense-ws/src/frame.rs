// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-ws - Data framing
//!
//! Server frames are always sent unfragmented and unmasked.  Client frames
//! must be masked, and are unmasked on decode.

use alloc::vec::Vec;
use core::fmt;

use crate::{MAX_CONTROL_PAYLOAD, MAX_PAYLOAD};

const FIN: u8 = 0x80;
const RSV: u8 = 0x70;
const OPCODE: u8 = 0x0F;
const MASK: u8 = 0x80;
const LEN: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// Frame opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Returns the opcode for a raw value, or None if it is reserved.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Close, Ping and Pong are control frames.
    pub fn is_control(&self) -> bool {
        (*self as u8) & 0x8 != 0
    }
}

/// A decoded client frame, with its payload unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// The payload as text, if this is a text frame holding valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        match self.opcode {
            Opcode::Text => core::str::from_utf8(&self.payload).ok(),
            _ => None,
        }
    }

    /// As [`Frame::text`], cut to at most `max` bytes for logging.
    pub fn text_prefix(&self, max: usize) -> Option<&str> {
        self.text().map(|text| truncate(text, max))
    }

    /// The status code carried by a close frame, if any.
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_slice()) {
            (Opcode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// Reasons a client frame could not be decoded.  All are fatal to the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A reserved bit was set
    Reserved,

    /// Unknown opcode
    Opcode(u8),

    /// Client frames must be masked
    Unmasked,

    /// Control frame payload longer than 125 bytes
    ControlTooLong,

    /// Control frame without FIN set
    FragmentedControl,

    /// Payload larger than this server accepts
    TooLarge(u64),
}

impl FrameError {
    /// The close status code to send the client for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            FrameError::TooLarge(_) => crate::CLOSE_TOO_BIG,
            _ => crate::CLOSE_PROTOCOL_ERROR,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Reserved => write!(f, "Reserved bits set"),
            FrameError::Opcode(op) => write!(f, "Unknown opcode 0x{op:X}"),
            FrameError::Unmasked => write!(f, "Unmasked client frame"),
            FrameError::ControlTooLong => write!(f, "Control frame too long"),
            FrameError::FragmentedControl => write!(f, "Fragmented control frame"),
            FrameError::TooLarge(len) => write!(f, "Frame too large: {len} bytes"),
        }
    }
}

/// Appends a single unmasked, final, frame to `out`.
pub fn encode(opcode: Opcode, payload: &[u8], out: &mut Vec<u8>) {
    out.push(FIN | opcode as u8);

    let len = payload.len();
    if len < LEN_16 as usize {
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(LEN_16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(LEN_64);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    out.extend_from_slice(payload);
}

/// Encodes a close frame carrying `code`.
pub fn encode_close(code: u16, out: &mut Vec<u8>) {
    encode(Opcode::Close, &code.to_be_bytes(), out);
}

/// Decodes a single client frame from the start of `buf`.
///
/// Returns:
/// - `Ok(Some((frame, consumed)))` when a whole frame is available
/// - `Ok(None)` when more bytes are needed
/// - `Err(FrameError)` when the frame is invalid
pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
    let [b0, b1, ..] = *buf else {
        return Ok(None);
    };

    if b0 & RSV != 0 {
        return Err(FrameError::Reserved);
    }
    let fin = b0 & FIN != 0;
    let opcode = Opcode::from_u8(b0 & OPCODE).ok_or(FrameError::Opcode(b0 & OPCODE))?;
    if b1 & MASK == 0 {
        return Err(FrameError::Unmasked);
    }

    let (len, mut pos) = match b1 & LEN {
        LEN_16 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
        }
        LEN_64 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(bytes), 10)
        }
        len => (len as u64, 2),
    };

    if opcode.is_control() {
        if !fin {
            return Err(FrameError::FragmentedControl);
        }
        if len > MAX_CONTROL_PAYLOAD as u64 {
            return Err(FrameError::ControlTooLong);
        }
    }
    if len > MAX_PAYLOAD as u64 {
        return Err(FrameError::TooLarge(len));
    }
    let len = len as usize;

    if buf.len() < pos + 4 + len {
        return Ok(None);
    }
    let mask = [buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]];
    pos += 4;

    let payload = buf[pos..pos + len]
        .iter()
        .enumerate()
        .map(|(ii, byte)| byte ^ mask[ii % 4])
        .collect();

    Ok(Some((
        Frame {
            fin,
            opcode,
            payload,
        },
        pos + len,
    )))
}

/// Truncates `text` to at most `max` bytes, backing off to the previous
/// char boundary if `max` falls inside a multi-byte character.
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6455 section 5.7
    const MASKED_HELLO: [u8; 11] = [
        0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
    ];

    // Masks a client frame with a fixed key
    fn client_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
        let mask = [0x11, 0x22, 0x33, 0x44];
        let mut out = Vec::new();
        out.push(FIN | opcode as u8);
        if payload.len() < 126 {
            out.push(MASK | payload.len() as u8);
        } else {
            out.push(MASK | LEN_16);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(&mask);
        out.extend(payload.iter().enumerate().map(|(ii, b)| b ^ mask[ii % 4]));
        out
    }

    #[test]
    fn encodes_unmasked_text() {
        let mut out = Vec::new();
        encode(Opcode::Text, b"Hello", &mut out);
        assert_eq!(out, [0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn encodes_16_bit_length() {
        let mut out = Vec::new();
        encode(Opcode::Binary, &[0u8; 256], &mut out);
        assert_eq!(&out[..4], &[0x82, 0x7e, 0x01, 0x00]);
        assert_eq!(out.len(), 4 + 256);
    }

    #[test]
    fn encodes_64_bit_length() {
        let mut out = Vec::new();
        encode(Opcode::Binary, &[0u8; 65536], &mut out);
        assert_eq!(
            &out[..10],
            &[0x82, 0x7f, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn encodes_close() {
        let mut out = Vec::new();
        encode_close(crate::CLOSE_NORMAL, &mut out);
        assert_eq!(out, [0x88, 0x02, 0x03, 0xe8]);
    }

    #[test]
    fn decodes_masked_hello() {
        let (frame, used) = decode(&MASKED_HELLO).unwrap().unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.text(), Some("Hello"));
        assert_eq!(used, MASKED_HELLO.len());
    }

    #[test]
    fn partial_frames_need_more_bytes() {
        for len in 0..MASKED_HELLO.len() {
            assert_eq!(decode(&MASKED_HELLO[..len]), Ok(None), "len {len}");
        }
    }

    #[test]
    fn reports_bytes_consumed_with_trailing_data() {
        let mut buf = MASKED_HELLO.to_vec();
        buf.extend_from_slice(&MASKED_HELLO);
        let (_, used) = decode(&buf).unwrap().unwrap();
        assert_eq!(used, MASKED_HELLO.len());
        let (frame, _) = decode(&buf[used..]).unwrap().unwrap();
        assert_eq!(frame.text(), Some("Hello"));
    }

    #[test]
    fn decodes_16_bit_length() {
        let payload = [b'x'; 300];
        let buf = client_frame(Opcode::Text, &payload);
        let (frame, used) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 300);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn rejects_unmasked() {
        assert_eq!(
            decode(&[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]),
            Err(FrameError::Unmasked)
        );
    }

    #[test]
    fn rejects_reserved_bits_and_opcodes() {
        assert_eq!(decode(&[0xc1, 0x80]), Err(FrameError::Reserved));
        assert_eq!(decode(&[0x83, 0x80]), Err(FrameError::Opcode(0x3)));
    }

    #[test]
    fn rejects_bad_control_frames() {
        assert_eq!(decode(&[0x09, 0x80]), Err(FrameError::FragmentedControl));
        assert_eq!(decode(&[0x89, 0xfe, 0x00, 0x7e]), Err(FrameError::ControlTooLong));
    }

    #[test]
    fn rejects_oversized_payload() {
        let err = decode(&[0x82, 0xfe, 0x10, 0x00]).unwrap_err();
        assert_eq!(err, FrameError::TooLarge(4096));
        assert_eq!(err.close_code(), crate::CLOSE_TOO_BIG);
    }

    #[test]
    fn close_and_ping_frames() {
        let buf = client_frame(Opcode::Close, &1001u16.to_be_bytes());
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.close_code(), Some(1001));

        let buf = client_frame(Opcode::Ping, b"hi");
        let (frame, _) = decode(&buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Ping);
        assert!(frame.opcode.is_control());
        assert_eq!(frame.payload, b"hi");
        assert_eq!(frame.text(), None);
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("hello", 128), "hello");
        assert_eq!(truncate("", 0), "");
        let exact = "a".repeat(128);
        assert_eq!(truncate(&exact, 128), exact);
    }

    #[test]
    fn truncate_backs_off_multibyte_char() {
        // 'é' is 2 bytes, occupying bytes 127 and 128
        let text = format!("{}é", "a".repeat(127));
        assert_eq!(truncate(&text, 128), "a".repeat(127));

        // '😀' is 4 bytes, occupying bytes 126 to 129
        let text = format!("{}😀tail", "a".repeat(126));
        assert_eq!(truncate(&text, 128), "a".repeat(126));
        assert_eq!(truncate(&text, 130), format!("{}😀", "a".repeat(126)));
    }

    #[test]
    fn truncate_at_boundary() {
        let text = format!("{}éé", "a".repeat(126));
        assert_eq!(truncate(&text, 128), format!("{}é", "a".repeat(126)));
    }

    #[test]
    fn text_prefix_of_frames() {
        let frame = Frame {
            fin: true,
            opcode: Opcode::Text,
            payload: "ü".repeat(100).into_bytes(),
        };
        assert_eq!(frame.text_prefix(5), Some("üü"));

        let frame = Frame {
            fin: true,
            opcode: Opcode::Binary,
            payload: b"hello".to_vec(),
        };
        assert_eq!(frame.text_prefix(5), None);
    }
}
