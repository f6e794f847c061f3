//! Simulated node chain.
//!
//! [`VirtualChain`] implements [`Bus`] and answers every protocol command
//! the way node firmware does, so the whole controller (client, retries,
//! enumeration, dispatch, supervision) runs without hardware.
//!
//! ```text
//!   controller (node 1) ─▶ node ─▶ node ─▶ …
//!                  downstream enable gates who can hear the bus
//! ```
//!
//! Node 1 is the controller itself: always assigned, downstream enabled.
//! Every other node starts unassigned and becomes audible at the default
//! address only once its upstream neighbour enables downstream.

use log::debug;

use crate::protocol::codec::{MAX_FRAME_LEN, decode_frame, encode_response};
use crate::protocol::command::{Command, Status};
use crate::protocol::payload::{
    FirmwareVersion, NodeInfo, PortDescriptor, PortState, PortType, SensorType,
    encode_ports, encode_sensor_readings,
};
use crate::protocol::transport::Bus;
use crate::protocol::{CONTROLLER_NODE_ID, DEFAULT_NODE_ADDRESS, MAX_NODES, PROTOCOL_VERSION, node_address};

/// Relay outputs on every virtual node.
pub const VIRTUAL_PORTS: u8 = 5;

/// Current a virtual port draws while on, unless overridden.
pub const DEFAULT_LOAD_MA: u16 = 100;

/// Nothing answered at the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack;

// ═══════════════════════════════════════════════════════════════
//  Virtual node
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct VirtualPort {
    pub port_type: PortType,
    pub on: bool,
    /// Current drawn while on.
    pub load_ma: u16,
}

#[derive(Debug, Clone)]
pub struct VirtualNode {
    node_id: Option<u8>,
    downstream_enabled: bool,
    offline: bool,
    ports: Vec<VirtualPort>,
    sensors: Vec<(SensorType, f64)>,
}

impl VirtualNode {
    fn new(node_id: Option<u8>) -> Self {
        Self {
            node_id,
            downstream_enabled: false,
            offline: false,
            ports: (0..VIRTUAL_PORTS)
                .map(|_| VirtualPort {
                    port_type: PortType::Unused,
                    on: false,
                    load_ma: DEFAULT_LOAD_MA,
                })
                .collect(),
            sensors: vec![(SensorType::Temperature, 25.0), (SensorType::Humidity, 50.0)],
        }
    }

    pub fn node_id(&self) -> Option<u8> {
        self.node_id
    }

    pub fn port(&self, port_id: u8) -> Option<&VirtualPort> {
        port_id
            .checked_sub(1)
            .and_then(|i| self.ports.get(usize::from(i)))
    }

    pub fn port_mut(&mut self, port_id: u8) -> Option<&mut VirtualPort> {
        port_id
            .checked_sub(1)
            .and_then(|i| self.ports.get_mut(usize::from(i)))
    }

    pub fn sensor(&self, sensor_type: SensorType) -> Option<f64> {
        self.sensors
            .iter()
            .find(|(t, _)| *t == sensor_type)
            .map(|&(_, v)| v)
    }

    pub fn set_sensor(&mut self, sensor_type: SensorType, value: f64) {
        match self.sensors.iter_mut().find(|(t, _)| *t == sensor_type) {
            Some(slot) => slot.1 = value,
            None => self.sensors.push((sensor_type, value)),
        }
    }

    pub fn remove_sensor(&mut self, sensor_type: SensorType) {
        self.sensors.retain(|(t, _)| *t != sensor_type);
    }

    fn port_state(&self, port_id: u8) -> Option<PortState> {
        self.port(port_id).map(|p| PortState {
            port_id,
            on: p.on,
            current_ma: if p.on { p.load_ma } else { 0 },
        })
    }

    /// Firmware request handler for an unassigned node.
    fn handle_unassigned(&mut self, command: Command, payload: &[u8]) -> (Status, Vec<u8>) {
        match command {
            Command::HelloUnassigned => (Status::Ok, vec![PROTOCOL_VERSION.0, PROTOCOL_VERSION.1]),
            Command::AssignId => match payload.first() {
                Some(&id) if id > CONTROLLER_NODE_ID && id <= MAX_NODES => {
                    self.node_id = Some(id);
                    (Status::Ok, Vec::new())
                }
                _ => (Status::InvalidParameters, Vec::new()),
            },
            _ => (Status::UnknownCommand, Vec::new()),
        }
    }

    /// Firmware request handler for an assigned node.
    fn handle_assigned(&mut self, node_id: u8, command: Command, payload: &[u8]) -> (Status, Vec<u8>) {
        match command {
            Command::Ping => (Status::Ok, Vec::new()),
            Command::EnableDownstream => {
                self.downstream_enabled = true;
                (Status::Ok, Vec::new())
            }
            Command::GetNodeInfo => {
                let info = NodeInfo {
                    node_id,
                    firmware: FirmwareVersion { major: 0, minor: 1, patch: 0 },
                    hardware_revision: 1,
                    port_count: self.ports.len() as u8,
                    sensor_count: self.sensors.len() as u8,
                    flags: 0,
                    uptime_hours: 0,
                };
                (Status::Ok, info.to_bytes().to_vec())
            }
            Command::GetPorts => {
                let descriptors: Vec<PortDescriptor> = self
                    .ports
                    .iter()
                    .zip(1u8..)
                    .map(|(p, port_id)| PortDescriptor {
                        port_id,
                        port_type: p.port_type,
                        flags: 0,
                    })
                    .collect();
                (Status::Ok, encode_ports(&descriptors).to_vec())
            }
            Command::GetPortState => match payload.first().and_then(|&p| self.port_state(p)) {
                Some(state) => (Status::Ok, state.to_bytes().to_vec()),
                None => (Status::InvalidParameters, Vec::new()),
            },
            Command::SetPortState => {
                let [port_id, state, ..] = *payload else {
                    return (Status::InvalidParameters, Vec::new());
                };
                let Some(port) = self.port_mut(port_id) else {
                    return (Status::InvalidParameters, Vec::new());
                };
                port.on = state == 1;
                match self.port_state(port_id) {
                    Some(s) => (Status::Ok, s.to_bytes().to_vec()),
                    None => (Status::HardwareError, Vec::new()),
                }
            }
            Command::GetSensorValues => (Status::Ok, encode_sensor_readings(&self.sensors).to_vec()),
            Command::HelloUnassigned
            | Command::AssignId
            | Command::SetConfigChunk
            | Command::GetConfigHash => (Status::UnknownCommand, Vec::new()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Chain
// ═══════════════════════════════════════════════════════════════

pub struct VirtualChain {
    nodes: Vec<VirtualNode>,
    /// Responses still to be corrupted (checksum byte flipped).
    corrupt_pending: usize,
    /// `(address, command byte)` of every request received.
    requests: Vec<(u8, u8)>,
}

impl VirtualChain {
    /// Controller plus `slaves` unassigned nodes.
    pub fn new(slaves: usize) -> Self {
        let mut controller = VirtualNode::new(Some(CONTROLLER_NODE_ID));
        controller.downstream_enabled = true;

        let mut nodes = vec![controller];
        nodes.extend((0..slaves).map(|_| VirtualNode::new(None)));
        Self {
            nodes,
            corrupt_pending: 0,
            requests: Vec::new(),
        }
    }

    /// Controller plus `slaves` nodes that already have ids 2.. assigned.
    pub fn enumerated(slaves: usize) -> Self {
        let mut chain = Self::new(slaves);
        for (node, id) in chain.nodes.iter_mut().skip(1).zip(CONTROLLER_NODE_ID + 1..) {
            node.node_id = Some(id);
            node.downstream_enabled = true;
        }
        chain
    }

    pub fn node(&self, node_id: u8) -> Option<&VirtualNode> {
        self.nodes.iter().find(|n| n.node_id == Some(node_id))
    }

    pub fn node_mut(&mut self, node_id: u8) -> Option<&mut VirtualNode> {
        self.nodes.iter_mut().find(|n| n.node_id == Some(node_id))
    }

    pub fn set_sensor(&mut self, node_id: u8, sensor_type: SensorType, value: f64) {
        if let Some(node) = self.node_mut(node_id) {
            node.set_sensor(sensor_type, value);
        }
    }

    pub fn port_on(&self, node_id: u8, port_id: u8) -> Option<bool> {
        self.node(node_id)?.port(port_id).map(|p| p.on)
    }

    pub fn set_port_load(&mut self, node_id: u8, port_id: u8, load_ma: u16) {
        if let Some(port) = self.node_mut(node_id).and_then(|n| n.port_mut(port_id)) {
            port.load_ma = load_ma;
        }
    }

    /// Take a node off the bus (or put it back).
    pub fn set_offline(&mut self, node_id: u8, offline: bool) {
        if let Some(node) = self.node_mut(node_id) {
            node.offline = offline;
        }
    }

    /// Corrupt the next `n` responses.
    pub fn corrupt_next(&mut self, n: usize) {
        self.corrupt_pending = n;
    }

    pub fn requests(&self) -> &[(u8, u8)] {
        &self.requests
    }

    /// Number of requests received carrying `command`.
    pub fn count(&self, command: Command) -> usize {
        self.requests
            .iter()
            .filter(|&&(_, c)| c == command.as_byte())
            .count()
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// Nodes reachable from the controller, in chain order.  A node can
    /// hear the bus once every node upstream of it has enabled downstream.
    fn powered(&self) -> usize {
        self.nodes
            .iter()
            .position(|n| !n.downstream_enabled)
            .map_or(self.nodes.len(), |i| i + 1)
    }

    fn route(&mut self, address: u8, command: Command, payload: &[u8]) -> Option<(Status, Vec<u8>)> {
        let powered = self.powered();
        let nodes = &mut self.nodes[..powered];

        if address == DEFAULT_NODE_ADDRESS {
            let node = nodes.iter_mut().find(|n| n.node_id.is_none() && !n.offline)?;
            return Some(node.handle_unassigned(command, payload));
        }

        let node = nodes
            .iter_mut()
            .find(|n| !n.offline && n.node_id.is_some_and(|id| node_address(id) == address))?;
        let node_id = node.node_id?;
        Some(node.handle_assigned(node_id, command, payload))
    }
}

impl Bus for VirtualChain {
    type Error = Nack;

    fn transact(&mut self, address: u8, request: &[u8], response: &mut [u8]) -> Result<usize, Nack> {
        let (status, payload) = match decode_frame(request) {
            Ok(frame) => {
                self.requests.push((address, frame.head));
                match frame.command() {
                    Ok(command) => self.route(address, command, frame.payload).ok_or(Nack)?,
                    Err(_) => (Status::UnknownCommand, Vec::new()),
                }
            }
            Err(e) => {
                debug!("Sim: bad request frame at 0x{address:02x}: {e}");
                (Status::GeneralError, Vec::new())
            }
        };

        let frame = encode_response(status, &payload).map_err(|_| Nack)?;
        let n = frame.len().min(response.len()).min(MAX_FRAME_LEN);
        response[..n].copy_from_slice(&frame[..n]);

        if self.corrupt_pending > 0 && n > 0 {
            self.corrupt_pending -= 1;
            response[n - 1] ^= 0xff;
        }
        Ok(n)
    }
}
