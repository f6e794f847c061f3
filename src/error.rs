//! Unified error types for the controller.
//!
//! Every fallible boundary (frame decoding, payload parsing, bus transfers,
//! configuration) converts into the single [`Error`] enum so the control
//! loop handles failures uniformly.  All variants are `Copy`; the rules
//! engine itself never produces an error.

use core::fmt;

use crate::protocol::command::Status;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation outside the rules engine funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame could not be encoded or decoded.
    Frame(FrameError),
    /// A frame decoded cleanly but its payload is malformed.
    Payload(PayloadError),
    /// The bus transfer failed or the node answered with a non-OK status.
    Bus(BusError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Payload(e) => write!(f, "payload: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

/// Framing failures.  Local to a single frame: the caller discards the
/// frame and retries the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than 3 bytes (head + length + checksum).
    TooShort,
    /// Declared payload length exceeds the bytes available.
    Incomplete { declared: u8, available: usize },
    /// Recomputed XOR disagrees with the trailing byte.
    ChecksumMismatch { expected: u8, actual: u8 },
    /// Payload does not fit the one-byte length field.
    PayloadTooLong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "frame too short"),
            Self::Incomplete {
                declared,
                available,
            } => write!(
                f,
                "frame incomplete ({declared} payload bytes declared, {available} available)"
            ),
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch (expected 0x{expected:02x}, got 0x{actual:02x})"
            ),
            Self::PayloadTooLong(len) => write!(f, "payload too long ({len} bytes)"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload shorter than the fixed layout requires.
    Truncated { needed: usize, got: usize },
    /// Request parameter outside the valid range (e.g. node id 0).
    InvalidParameter,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, got } => {
                write!(f, "truncated ({got} bytes, need {needed})")
            }
            Self::InvalidParameter => write!(f, "invalid parameter"),
        }
    }
}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The underlying transfer failed (NACK, arbitration loss, timeout).
    Transfer,
    /// Every retry was exhausted without a valid frame.
    NoResponse,
    /// The node answered with a non-OK status byte.
    Status(Status),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "transfer failed"),
            Self::NoResponse => write!(f, "no valid response"),
            Self::Status(s) => write!(f, "node status {s}"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
