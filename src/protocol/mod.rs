//! Controller ↔ node bus protocol.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                           │
//! │                                                              │
//! │  ┌────────────┐   ┌──────────┐   ┌────────────────────────┐ │
//! │  │ NodeClient │──▶│  Codec   │──▶│  Bus (trait)           │ │
//! │  │ (retries)  │   │ (framing)│   │  → I²C / simulator     │ │
//! │  └────────────┘   └──────────┘   └────────────────────────┘ │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  ┌────────────┐                                              │
//! │  │  Payload   │   (sensor records, port state, node info)   │
//! │  └────────────┘                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes are daisy-chained.  A freshly powered node listens at
//! [`DEFAULT_NODE_ADDRESS`] until the controller assigns it an id; from
//! then on it answers at [`node_address`]`(id)`.

pub mod client;
pub mod codec;
pub mod command;
pub mod payload;
pub mod transport;

use core::fmt;

pub use client::NodeClient;
pub use transport::Bus;

/// Protocol version advertised by this controller (major, minor).
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Address every unassigned node listens on.
pub const DEFAULT_NODE_ADDRESS: u8 = 0x30;

/// Assigned node `n` answers at `NODE_ADDRESS_BASE + n`.
pub const NODE_ADDRESS_BASE: u8 = 0x30;

/// The controller is always node 1.
pub const CONTROLLER_NODE_ID: u8 = 1;

/// Highest node id the chain supports.
pub const MAX_NODES: u8 = 16;

/// Bus address of an assigned node.
pub const fn node_address(node_id: u8) -> u8 {
    NODE_ADDRESS_BASE.wrapping_add(node_id)
}

/// One relay output somewhere on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortAddress {
    pub node_id: u8,
    pub port_id: u8,
}

impl PortAddress {
    pub const fn new(node_id: u8, port_id: u8) -> Self {
        Self { node_id, port_id }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} port {}", self.node_id, self.port_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigned_addresses_follow_base() {
        assert_eq!(node_address(CONTROLLER_NODE_ID), 0x31);
        assert_eq!(node_address(MAX_NODES), 0x40);
        // Id 0 would collide with the unassigned address.
        assert_eq!(node_address(0), DEFAULT_NODE_ADDRESS);
    }
}
