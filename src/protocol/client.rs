//! Controller-side node client.
//!
//! Wraps a [`Bus`] with request encoding, response decoding and the
//! retry policy: a malformed frame, a failed transfer or a `BUSY` status
//! is discarded and the request is sent again, up to `retries` extra
//! attempts.  Any other non-OK status is final.

use log::{debug, info, warn};

use super::codec::{Payload, MAX_FRAME_LEN, decode_frame, encode_request};
use super::command::{Command, Status};
use super::payload::{
    NodeInfo, PortDescriptor, PortState, SensorReading, parse_ports, parse_sensor_readings,
    set_port_state_request,
};
use super::transport::Bus;
use super::{CONTROLLER_NODE_ID, DEFAULT_NODE_ADDRESS, MAX_NODES, node_address};
use crate::error::{BusError, Error, Result};

/// Extra attempts after the first one.
pub const DEFAULT_RETRIES: u8 = 2;

pub struct NodeClient<B: Bus> {
    bus: B,
    retries: u8,
    rx: [u8; MAX_FRAME_LEN],
}

impl<B: Bus> NodeClient<B> {
    pub fn new(bus: B) -> Self {
        Self::with_retries(bus, DEFAULT_RETRIES)
    }

    pub fn with_retries(bus: B, retries: u8) -> Self {
        Self {
            bus,
            retries,
            rx: [0; MAX_FRAME_LEN],
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    // ── Raw requests ──────────────────────────────────────────

    /// Send `command` to an assigned node and return the OK payload.
    pub fn request(&mut self, node_id: u8, command: Command, payload: &[u8]) -> Result<Payload> {
        self.request_at(node_address(node_id), command, payload)
    }

    /// Send `command` to a raw bus address.
    pub fn request_at(&mut self, address: u8, command: Command, payload: &[u8]) -> Result<Payload> {
        let frame = encode_request(command, payload)?;
        let attempts = u16::from(self.retries) + 1;
        let mut last_err = Error::Bus(BusError::NoResponse);

        for attempt in 1..=attempts {
            let n = match self.bus.transact(address, &frame, &mut self.rx) {
                Ok(n) => n.min(self.rx.len()),
                Err(e) => {
                    debug!(
                        "Bus: 0x{address:02x} {command:?} transfer failed ({e:?}), attempt {attempt}/{attempts}"
                    );
                    last_err = BusError::Transfer.into();
                    continue;
                }
            };

            let response = match decode_frame(&self.rx[..n]) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Bus: 0x{address:02x} {command:?} {e}, attempt {attempt}/{attempts}");
                    last_err = e.into();
                    continue;
                }
            };

            match response.status() {
                Status::Ok => {
                    let mut out = Payload::new();
                    let _ = out.extend_from_slice(response.payload);
                    return Ok(out);
                }
                Status::Busy => {
                    debug!("Bus: 0x{address:02x} busy, attempt {attempt}/{attempts}");
                    last_err = BusError::Status(Status::Busy).into();
                }
                status => return Err(BusError::Status(status).into()),
            }
        }

        Err(last_err)
    }

    // ── Typed operations ──────────────────────────────────────

    pub fn ping(&mut self, node_id: u8) -> Result<()> {
        self.request(node_id, Command::Ping, &[]).map(|_| ())
    }

    pub fn node_info(&mut self, node_id: u8) -> Result<NodeInfo> {
        let payload = self.request(node_id, Command::GetNodeInfo, &[])?;
        Ok(NodeInfo::parse(&payload)?)
    }

    pub fn ports(&mut self, node_id: u8) -> Result<Vec<PortDescriptor>> {
        let payload = self.request(node_id, Command::GetPorts, &[])?;
        Ok(parse_ports(&payload)?)
    }

    pub fn port_state(&mut self, node_id: u8, port_id: u8) -> Result<PortState> {
        let payload = self.request(node_id, Command::GetPortState, &[port_id])?;
        Ok(PortState::parse(&payload)?)
    }

    pub fn set_port_state(&mut self, node_id: u8, port_id: u8, on: bool) -> Result<()> {
        self.request(
            node_id,
            Command::SetPortState,
            &set_port_state_request(port_id, on),
        )
        .map(|_| ())
    }

    pub fn sensor_values(&mut self, node_id: u8) -> Result<Vec<SensorReading>> {
        let payload = self.request(node_id, Command::GetSensorValues, &[])?;
        Ok(parse_sensor_readings(&payload)?)
    }

    /// Walk the chain: greet the unassigned node at the default address,
    /// give it the next id, let it enable its downstream neighbour, repeat.
    ///
    /// Stops when nobody answers at the default address or the node limit
    /// is reached.  Returns the ids assigned in this pass.
    pub fn enumerate(&mut self) -> Result<Vec<u8>> {
        let mut assigned = Vec::new();
        let mut next_id = CONTROLLER_NODE_ID + 1;

        while next_id <= MAX_NODES {
            match self.request_at(DEFAULT_NODE_ADDRESS, Command::HelloUnassigned, &[]) {
                Ok(_) => {}
                Err(Error::Bus(BusError::Transfer | BusError::NoResponse)) => break,
                Err(e) => {
                    warn!("Enumeration: HELLO failed ({e}), stopping");
                    break;
                }
            }

            self.request_at(DEFAULT_NODE_ADDRESS, Command::AssignId, &[next_id])?;
            self.request(next_id, Command::EnableDownstream, &[])?;
            info!("Enumeration: node {next_id} assigned");

            assigned.push(next_id);
            next_id += 1;
        }

        info!("Enumeration complete: {} node(s) assigned", assigned.len());
        Ok(assigned)
    }
}
