//! Fuzz target: response payload parsers
//!
//! Node responses arrive from the bus; a broken node must not be able to
//! panic the controller.
//!
//! cargo fuzz run fuzz_payload_parsers

#![no_main]

use libfuzzer_sys::fuzz_target;
use terrahub::protocol::payload::{
    NodeInfo, PortState, SENSOR_RECORD_LEN, parse_ports, parse_sensor_readings,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(readings) = parse_sensor_readings(data) {
        assert!(1 + readings.len() * SENSOR_RECORD_LEN <= data.len());
    }
    let _ = parse_ports(data);
    let _ = PortState::parse(data);
    let _ = NodeInfo::parse(data);
});
