//! Command and status codes.

use core::fmt;

/// Request command byte (first byte of a request frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // ── Enumeration (unassigned nodes at the default address) ──
    HelloUnassigned = 0x01,
    AssignId = 0x02,
    EnableDownstream = 0x03,

    // ── Regular commands (assigned nodes) ──
    Ping = 0x10,
    GetNodeInfo = 0x11,
    GetPorts = 0x12,
    GetPortState = 0x13,
    SetPortState = 0x14,
    GetSensorValues = 0x20,
    SetConfigChunk = 0x30,
    GetConfigHash = 0x31,
}

impl Command {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0x01 => Self::HelloUnassigned,
            0x02 => Self::AssignId,
            0x03 => Self::EnableDownstream,
            0x10 => Self::Ping,
            0x11 => Self::GetNodeInfo,
            0x12 => Self::GetPorts,
            0x13 => Self::GetPortState,
            0x14 => Self::SetPortState,
            0x20 => Self::GetSensorValues,
            0x30 => Self::SetConfigChunk,
            0x31 => Self::GetConfigHash,
            other => return Err(other),
        })
    }
}

/// Response status byte (first byte of a response frame).
///
/// Unrecognised bytes are preserved in [`Status::Other`] so a newer node
/// firmware never makes the controller drop a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    UnknownCommand,
    InvalidParameters,
    Busy,
    HardwareError,
    GeneralError,
    Other(u8),
}

impl Status {
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::UnknownCommand => 0x01,
            Self::InvalidParameters => 0x02,
            Self::Busy => 0x03,
            Self::HardwareError => 0x04,
            Self::GeneralError => 0xff,
            Self::Other(b) => b,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::UnknownCommand,
            0x02 => Self::InvalidParameters,
            0x03 => Self::Busy,
            0x04 => Self::HardwareError,
            0xff => Self::GeneralError,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::InvalidParameters => write!(f, "invalid parameters"),
            Self::Busy => write!(f, "busy"),
            Self::HardwareError => write!(f, "hardware error"),
            Self::GeneralError => write!(f, "general error"),
            Self::Other(b) => write!(f, "0x{b:02x}"),
        }
    }
}
