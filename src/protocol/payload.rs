//! Payload layouts carried inside frames.
//!
//! All multi-byte fields are little-endian.  Parsers validate lengths and
//! return [`PayloadError::Truncated`] instead of panicking on short input;
//! encoders are used by node-side code (and the simulator).

use core::fmt;

use serde::{Deserialize, Serialize};

use super::codec::{MAX_PAYLOAD_LEN, Payload};
use crate::error::PayloadError;

/// Bytes per sensor record in a `GET_SENSOR_VALUES` response.
pub const SENSOR_RECORD_LEN: usize = 4;

/// Bytes in a `GET_NODE_INFO` response.
pub const NODE_INFO_LEN: usize = 10;

/// Bytes in a `GET_PORT_STATE` / `SET_PORT_STATE` response.
pub const PORT_STATE_LEN: usize = 4;

/// Bytes per port record in a `GET_PORTS` response.
pub const PORT_RECORD_LEN: usize = 3;

fn need(payload: &[u8], needed: usize) -> Result<(), PayloadError> {
    if payload.len() < needed {
        Err(PayloadError::Truncated {
            needed,
            got: payload.len(),
        })
    } else {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sensor types and readings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Light,
    Pressure,
}

impl SensorType {
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Temperature => 0x01,
            Self::Humidity => 0x02,
            Self::Light => 0x03,
            Self::Pressure => 0x04,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Temperature),
            0x02 => Some(Self::Humidity),
            0x03 => Some(Self::Light),
            0x04 => Some(Self::Pressure),
            _ => None,
        }
    }

    /// Snapshot key used by rule conditions.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
            Self::Pressure => "pressure",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%RH",
            Self::Light => "lux",
            Self::Pressure => "hPa",
        }
    }

    /// Divisor between the raw wire value and the physical value.
    const fn scale(self) -> f64 {
        match self {
            Self::Temperature | Self::Humidity => 10.0,
            Self::Light | Self::Pressure => 1.0,
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Light => "Light Level",
            Self::Pressure => "Pressure",
        };
        f.write_str(name)
    }
}

/// One decoded sensor record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// `None` for a type byte this firmware does not know.
    pub sensor_type: Option<SensorType>,
    pub raw_type: u8,
    pub value: f64,
}

impl SensorReading {
    pub fn unit(&self) -> &'static str {
        self.sensor_type.map_or("", SensorType::unit)
    }
}

/// Parse `[count]([type][lo][hi][reserved])*`.
pub fn parse_sensor_readings(payload: &[u8]) -> Result<Vec<SensorReading>, PayloadError> {
    need(payload, 1)?;
    let count = payload[0] as usize;
    need(payload, 1 + count * SENSOR_RECORD_LEN)?;

    let readings = payload[1..1 + count * SENSOR_RECORD_LEN]
        .chunks_exact(SENSOR_RECORD_LEN)
        .map(|rec| {
            let raw = u16::from_le_bytes([rec[1], rec[2]]);
            let sensor_type = SensorType::from_byte(rec[0]);
            let scale = sensor_type.map_or(1.0, SensorType::scale);
            SensorReading {
                sensor_type,
                raw_type: rec[0],
                value: f64::from(raw) / scale,
            }
        })
        .collect();
    Ok(readings)
}

/// Encode readings into the `GET_SENSOR_VALUES` layout.  Values are scaled,
/// rounded and saturated into the unsigned 16-bit raw range.
pub fn encode_sensor_readings(readings: &[(SensorType, f64)]) -> Payload {
    let mut out = Payload::new();
    let count = readings.len().min((MAX_PAYLOAD_LEN - 1) / SENSOR_RECORD_LEN);
    let _ = out.push(count as u8);
    for (sensor_type, value) in &readings[..count] {
        let raw = (value * sensor_type.scale()).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        let [lo, hi] = raw.to_le_bytes();
        let _ = out.extend_from_slice(&[sensor_type.as_byte(), lo, hi, 0]);
    }
    out
}

// ═══════════════════════════════════════════════════════════════
//  Ports
// ═══════════════════════════════════════════════════════════════

/// What a relay output drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    #[default]
    Unused,
    Light,
    Heater,
    Pump,
    Mister,
    Atomizer,
    Fan,
    Other,
}

impl PortType {
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Unused => 0x00,
            Self::Light => 0x01,
            Self::Heater => 0x02,
            Self::Pump => 0x03,
            Self::Mister => 0x04,
            Self::Atomizer => 0x05,
            Self::Fan => 0x06,
            Self::Other => 0xff,
        }
    }

    /// Unknown bytes map to [`PortType::Other`].
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Unused,
            0x01 => Self::Light,
            0x02 => Self::Heater,
            0x03 => Self::Pump,
            0x04 => Self::Mister,
            0x05 => Self::Atomizer,
            0x06 => Self::Fan,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unused => "Unused",
            Self::Light => "Light",
            Self::Heater => "Heater",
            Self::Pump => "Pump",
            Self::Mister => "Mister",
            Self::Atomizer => "Atomizer",
            Self::Fan => "Fan",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

/// One entry of a `GET_PORTS` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDescriptor {
    pub port_id: u8,
    pub port_type: PortType,
    pub flags: u8,
}

pub fn parse_ports(payload: &[u8]) -> Result<Vec<PortDescriptor>, PayloadError> {
    need(payload, 1)?;
    let count = payload[0] as usize;
    need(payload, 1 + count * PORT_RECORD_LEN)?;
    Ok(payload[1..1 + count * PORT_RECORD_LEN]
        .chunks_exact(PORT_RECORD_LEN)
        .map(|rec| PortDescriptor {
            port_id: rec[0],
            port_type: PortType::from_byte(rec[1]),
            flags: rec[2],
        })
        .collect())
}

pub fn encode_ports(ports: &[PortDescriptor]) -> Payload {
    let mut out = Payload::new();
    let count = ports.len().min((MAX_PAYLOAD_LEN - 1) / PORT_RECORD_LEN);
    let _ = out.push(count as u8);
    for p in &ports[..count] {
        let _ = out.extend_from_slice(&[p.port_id, p.port_type.as_byte(), p.flags]);
    }
    out
}

/// Live state of one relay output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortState {
    pub port_id: u8,
    pub on: bool,
    /// Measured load current.
    pub current_ma: u16,
}

impl PortState {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        need(payload, PORT_STATE_LEN)?;
        Ok(Self {
            port_id: payload[0],
            on: payload[1] == 1,
            current_ma: u16::from_le_bytes([payload[2], payload[3]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; PORT_STATE_LEN] {
        let [lo, hi] = self.current_ma.to_le_bytes();
        [self.port_id, u8::from(self.on), lo, hi]
    }
}

/// `SET_PORT_STATE` request payload.
pub fn set_port_state_request(port_id: u8, on: bool) -> [u8; 2] {
    [port_id, u8::from(on)]
}

// ═══════════════════════════════════════════════════════════════
//  Node info
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: u8,
    pub firmware: FirmwareVersion,
    pub hardware_revision: u8,
    pub port_count: u8,
    pub sensor_count: u8,
    pub flags: u16,
    pub uptime_hours: u8,
}

impl NodeInfo {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        need(payload, NODE_INFO_LEN)?;
        Ok(Self {
            node_id: payload[0],
            firmware: FirmwareVersion {
                major: payload[1],
                minor: payload[2],
                patch: payload[3],
            },
            hardware_revision: payload[4],
            port_count: payload[5],
            sensor_count: payload[6],
            flags: u16::from_le_bytes([payload[7], payload[8]]),
            uptime_hours: payload[9],
        })
    }

    pub fn to_bytes(&self) -> [u8; NODE_INFO_LEN] {
        let [flags_lo, flags_hi] = self.flags.to_le_bytes();
        [
            self.node_id,
            self.firmware.major,
            self.firmware.minor,
            self.firmware.patch,
            self.hardware_revision,
            self.port_count,
            self.sensor_count,
            flags_lo,
            flags_hi,
            self.uptime_hours,
        ]
    }
}
