//! Integration tests: NodeClient → VirtualChain.

use terrahub::error::{BusError, Error, FrameError};
use terrahub::protocol::command::{Command, Status};
use terrahub::protocol::payload::SensorType;
use terrahub::protocol::{DEFAULT_NODE_ADDRESS, NodeClient, node_address};
use terrahub::sim::{DEFAULT_LOAD_MA, VIRTUAL_PORTS, VirtualChain};

// ── Enumeration ───────────────────────────────────────────────

#[test]
fn enumeration_walks_the_chain() {
    let mut client = NodeClient::new(VirtualChain::new(3));
    assert_eq!(client.enumerate().unwrap(), vec![2, 3, 4]);

    for id in 2..=4 {
        client.ping(id).unwrap();
    }
    assert_eq!(client.bus().node(4).unwrap().node_id(), Some(4));

    // A second pass finds nobody left at the default address.
    assert!(client.enumerate().unwrap().is_empty());
}

#[test]
fn enumeration_order_is_hello_assign_enable() {
    let mut client = NodeClient::new(VirtualChain::new(1));
    client.enumerate().unwrap();

    let requests = client.bus().requests();
    assert_eq!(
        &requests[..3],
        &[
            (DEFAULT_NODE_ADDRESS, Command::HelloUnassigned.as_byte()),
            (DEFAULT_NODE_ADDRESS, Command::AssignId.as_byte()),
            (node_address(2), Command::EnableDownstream.as_byte()),
        ]
    );
}

#[test]
fn empty_chain_enumerates_nothing() {
    let mut client = NodeClient::new(VirtualChain::new(0));
    assert!(client.enumerate().unwrap().is_empty());
    client.ping(1).unwrap();
}

// ── Typed operations ──────────────────────────────────────────

#[test]
fn node_info_and_ports() {
    let mut client = NodeClient::new(VirtualChain::enumerated(1));

    let info = client.node_info(2).unwrap();
    assert_eq!(info.node_id, 2);
    assert_eq!(info.port_count, VIRTUAL_PORTS);
    assert_eq!(info.sensor_count, 2);
    assert_eq!(info.firmware.to_string(), "0.1.0");

    let ports = client.ports(2).unwrap();
    assert_eq!(ports.len(), usize::from(VIRTUAL_PORTS));
    assert_eq!(ports[0].port_id, 1);
}

#[test]
fn set_and_read_port_state() {
    let mut client = NodeClient::new(VirtualChain::enumerated(1));

    client.set_port_state(2, 3, true).unwrap();
    let state = client.port_state(2, 3).unwrap();
    assert!(state.on);
    assert_eq!(state.current_ma, DEFAULT_LOAD_MA);
    assert_eq!(client.bus().port_on(2, 3), Some(true));

    client.set_port_state(2, 3, false).unwrap();
    let state = client.port_state(2, 3).unwrap();
    assert!(!state.on);
    assert_eq!(state.current_ma, 0);
}

#[test]
fn sensor_values_carry_scaled_readings() {
    let mut client = NodeClient::new(VirtualChain::enumerated(1));
    client.bus_mut().set_sensor(2, SensorType::Humidity, 41.7);
    client.bus_mut().set_sensor(2, SensorType::Light, 850.0);

    let readings = client.sensor_values(2).unwrap();
    let value = |t| {
        readings
            .iter()
            .find(|r| r.sensor_type == Some(t))
            .map(|r| r.value)
    };
    assert_eq!(value(SensorType::Temperature), Some(25.0));
    assert!((value(SensorType::Humidity).unwrap() - 41.7).abs() < 1e-9);
    assert_eq!(value(SensorType::Light), Some(850.0));
}

// ── Error handling and retries ────────────────────────────────

#[test]
fn invalid_port_is_a_final_status() {
    let mut client = NodeClient::new(VirtualChain::enumerated(1));
    client.bus_mut().clear_requests();

    let err = client.set_port_state(2, 9, true).unwrap_err();
    assert_eq!(err, Error::Bus(BusError::Status(Status::InvalidParameters)));
    // Not retried.
    assert_eq!(client.bus().count(Command::SetPortState), 1);
}

#[test]
fn corrupted_responses_are_retried() {
    let mut client = NodeClient::with_retries(VirtualChain::enumerated(1), 2);
    client.bus_mut().clear_requests();
    client.bus_mut().corrupt_next(2);

    client.ping(2).unwrap();
    assert_eq!(client.bus().count(Command::Ping), 3);
}

#[test]
fn retries_exhausted_reports_last_frame_error() {
    let mut client = NodeClient::with_retries(VirtualChain::enumerated(1), 2);
    client.bus_mut().corrupt_next(3);

    let err = client.ping(2).unwrap_err();
    assert!(matches!(err, Error::Frame(FrameError::ChecksumMismatch { .. })));
    // The next request is clean again.
    client.ping(2).unwrap();
}

#[test]
fn offline_node_is_a_transfer_error() {
    let mut client = NodeClient::new(VirtualChain::enumerated(2));
    client.bus_mut().set_offline(3, true);

    assert_eq!(client.ping(3).unwrap_err(), Error::Bus(BusError::Transfer));
    client.ping(2).unwrap();

    client.bus_mut().set_offline(3, false);
    client.ping(3).unwrap();
}

#[test]
fn config_commands_are_not_supported_by_nodes() {
    let mut client = NodeClient::new(VirtualChain::enumerated(1));
    let err = client.request(2, Command::GetConfigHash, &[]).unwrap_err();
    assert_eq!(err, Error::Bus(BusError::Status(Status::UnknownCommand)));
}
