//! Checksummed frame codec.
//!
//! Wire format (requests and responses share the layout):
//! ```text
//! ┌──────────────┬────────────┬─────────────────┬──────────────┐
//! │ Head (1B)    │ Length (1B)│ Payload (N B)   │ Checksum (1B)│
//! │ cmd / status │ N ≤ 255    │                 │ XOR of all   │
//! │              │            │                 │ prior bytes  │
//! └──────────────┴────────────┴─────────────────┴──────────────┘
//! ```
//!
//! The I²C master reads a fixed-size buffer, so the decoder accepts and
//! ignores trailing bytes after a complete frame.
//!
//! An XOR checksum detects every single-byte corruption but not two
//! corruptions that cancel each other out.  That is a property of the
//! format and is not compensated for here.

use heapless::Vec;

use super::command::{Command, Status};
use crate::error::FrameError;

/// Head byte plus length byte.
pub const HEADER_SIZE: usize = 2;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Largest complete frame (header + payload + checksum).
pub const MAX_FRAME_LEN: usize = HEADER_SIZE + MAX_PAYLOAD_LEN + 1;

/// Shortest valid frame: empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_SIZE + 1;

/// Stack buffer holding one encoded frame.
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

/// Stack buffer holding one payload.
pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// Running XOR of every byte in `data`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode `[head][len][payload][checksum]`.
pub fn encode_frame(head: u8, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }

    let mut out = FrameBuf::new();
    // Capacity is checked above; these cannot fail.
    let _ = out.push(head);
    let _ = out.push(payload.len() as u8);
    let _ = out.extend_from_slice(payload);
    let sum = checksum(&out);
    let _ = out.push(sum);
    Ok(out)
}

/// Encode a controller → node request.
pub fn encode_request(command: Command, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    encode_frame(command.as_byte(), payload)
}

/// Encode a node → controller response.
pub fn encode_response(status: Status, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    encode_frame(status.as_byte(), payload)
}

/// A decoded frame borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Command byte (requests) or status byte (responses).
    pub head: u8,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Interpret the head byte as a response status.
    pub fn status(&self) -> Status {
        Status::from(self.head)
    }

    /// Interpret the head byte as a request command.
    pub fn command(&self) -> Result<Command, u8> {
        Command::try_from(self.head)
    }

    /// Number of bytes this frame occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len() + 1
    }
}

/// Decode one frame from the start of `buf`.
///
/// Checks, in order: minimum length, declared length against available
/// bytes, checksum.
pub fn decode_frame(buf: &[u8]) -> Result<Frame<'_>, FrameError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort);
    }

    let declared = buf[1];
    let end = HEADER_SIZE + declared as usize;
    if buf.len() < end + 1 {
        return Err(FrameError::Incomplete {
            declared,
            available: buf.len() - MIN_FRAME_LEN,
        });
    }

    let expected = checksum(&buf[..end]);
    let actual = buf[end];
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(Frame {
        head: buf[0],
        payload: &buf[HEADER_SIZE..end],
    })
}
