//! Integration tests: configuration document ↔ storage adapters.

use std::path::PathBuf;

use terrahub::adapters::store::{JsonFileStore, MemoryStore};
use terrahub::app::ports::{ConfigError, ConfigPort, StoragePort};
use terrahub::config::{ControllerConfig, NodeConfig};
use terrahub::protocol::payload::{PortType, SensorType};
use terrahub::rules::{ComparisonOperator, Rule, RuleAction, RuleCondition};
use terrahub::schedule::{DayOfWeek, Schedule};

const DOCUMENT: &str = r#"{
  "version": "1.0",
  "nodes": [
    {
      "node_id": 1,
      "name": "Controller",
      "ports": [
        {"port_id": 1, "type": "light", "name": "Canopy LED", "enabled": true},
        {"port_id": 2, "type": "mister", "name": "Mister", "enabled": true}
      ],
      "sensors": [
        {"sensor_id": 1, "type": "humidity", "name": "RH", "enabled": true, "calibration_offset": 2.0}
      ]
    }
  ],
  "rules": [
    {
      "id": "mist",
      "name": "Mist when dry",
      "enabled": true,
      "condition": {"threshold": {"sensor": "humidity", "operator": "<", "value": 60, "hysteresis": 5}},
      "action": {"set_port": {"node_id": 1, "port_id": 2, "state": true, "min_duration_secs": 30}}
    }
  ],
  "schedules": [
    {
      "id": "day",
      "name": "Daylight",
      "enabled": true,
      "node_id": 1,
      "port_id": 1,
      "days": ["monday", "tuesday", "wednesday", "thursday", "friday"],
      "entries": [{"time": "07:00", "state": true}, {"time": "19:30", "state": false}]
    }
  ]
}"#;

fn full_config() -> ControllerConfig {
    let mut c = ControllerConfig::default();
    c.nodes.push(NodeConfig::with_default_ports(2));
    c.rules.push(Rule::new(
        "fan",
        "Fan when hot",
        RuleCondition::threshold("temperature", ComparisonOperator::Gte, 29.5, Some(1.0)),
        RuleAction::set_port(2, 4, true, Some(120.0)),
    ));
    let mut s = Schedule::template("lights", 2, 1);
    s.enabled = true;
    c.schedules.push(s);
    c
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("terrahub-{}-{name}.json", std::process::id()))
}

// ── Document ──────────────────────────────────────────────────

#[test]
fn hand_written_document_parses_and_validates() {
    let c = ControllerConfig::from_json(DOCUMENT).unwrap();
    assert!(c.validate().valid, "{:?}", c.validate().errors);

    let node = c.node(1).unwrap();
    assert_eq!(node.port(2).unwrap().port_type, PortType::Mister);
    assert_eq!(node.sensor_offset(SensorType::Humidity), Some(2.0));
    assert_eq!(node.sensor_offset(SensorType::Temperature), Some(0.0));

    let rule = &c.rules[0];
    let RuleCondition::Threshold(cond) = &rule.condition;
    assert_eq!(cond.operator, ComparisonOperator::Lt);
    assert_eq!(cond.threshold, 60.0);
    assert_eq!(rule.action.min_hold_ms(), 30_000);

    assert_eq!(c.schedules[0].days.len(), 5);
    assert_eq!(c.schedules[0].desired_state(DayOfWeek::Saturday, 8 * 60), None);
    assert_eq!(c.schedules[0].desired_state(DayOfWeek::Monday, 8 * 60), Some(true));
    assert_eq!(c.schedules[0].desired_state(DayOfWeek::Tuesday, 6 * 60), Some(false));
    assert_eq!(c.schedules[0].desired_state(DayOfWeek::Sunday, 8 * 60), None);
}

#[test]
fn structural_errors_are_parse_errors() {
    let broken = DOCUMENT.replace(r#""operator": "<""#, r#""operator": "~""#);
    assert!(ControllerConfig::from_json(&broken).is_err());
}

// ── MemoryStore ───────────────────────────────────────────────

#[test]
fn memory_store_round_trip() {
    let store = MemoryStore::new();
    let config = full_config();
    store.save(&config).unwrap();
    assert_eq!(store.load().unwrap(), config);
}

#[test]
fn memory_store_refuses_invalid_config() {
    let store = MemoryStore::new();
    let mut config = full_config();
    config.rules.push(config.rules[0].clone());

    assert_eq!(store.save(&config), Err(ConfigError::ValidationFailed));
    // Nothing was written.
    assert_eq!(store.load().unwrap(), ControllerConfig::default());
}

#[test]
fn memory_store_namespaces_are_isolated() {
    let mut store = MemoryStore::new();
    store.write("a", "key", b"one").unwrap();
    store.write("b", "key", b"two").unwrap();

    let mut buf = [0u8; 8];
    let n = store.read("b", "key", &mut buf).unwrap();
    assert_eq!(&buf[..n], b"two");

    store.delete("a", "key").unwrap();
    assert!(!store.exists("a", "key"));
    assert!(store.exists("b", "key"));
}

// ── JsonFileStore ─────────────────────────────────────────────

#[test]
fn json_file_round_trip() {
    let path = temp_path("roundtrip");
    let store = JsonFileStore::new(&path);
    let config = full_config();

    store.save(&config).unwrap();
    assert_eq!(store.load().unwrap(), config);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(r#""id": "fan""#));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn missing_json_file_loads_defaults() {
    let store = JsonFileStore::new(temp_path("missing"));
    assert_eq!(store.load().unwrap(), ControllerConfig::default());
}

#[test]
fn garbage_json_file_is_corrupted() {
    let path = temp_path("garbage");
    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(JsonFileStore::new(&path).load(), Err(ConfigError::Corrupted));
    std::fs::remove_file(&path).unwrap();
}
