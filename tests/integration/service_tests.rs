//! Integration tests: ControllerService → NodeClient → VirtualChain.

use terrahub::adapters::store::MemoryStore;
use terrahub::adapters::time::ManualClock;
use terrahub::app::commands::ControllerCommand;
use terrahub::app::dispatch::IntentSource;
use terrahub::app::events::ControllerEvent;
use terrahub::app::ports::ConfigPort;
use terrahub::app::service::ControllerService;
use terrahub::config::{ControllerConfig, NodeConfig, SensorConfig};
use terrahub::protocol::command::Command;
use terrahub::protocol::payload::SensorType;
use terrahub::protocol::{NodeClient, PortAddress};
use terrahub::rules::{ComparisonOperator, EvaluationReason, Rule, RuleAction, RuleCondition};
use terrahub::safety::PortFault;
use terrahub::schedule::{DayOfWeek, Schedule};
use terrahub::sim::VirtualChain;

use crate::mocks::{MockConfigStore, RecordingSink};

// ── Fixture ───────────────────────────────────────────────────

struct Rig {
    service: ControllerService,
    client: NodeClient<VirtualChain>,
    clock: ManualClock,
    sink: RecordingSink,
}

impl Rig {
    /// Controller (node 1) plus one expansion node (node 2).
    fn new(rules: Vec<Rule>) -> Self {
        let mut config = ControllerConfig::default();
        config.nodes.push(NodeConfig::with_default_ports(2));
        config.rules = rules;
        Self::with_config(config)
    }

    fn with_config(config: ControllerConfig) -> Self {
        assert!(config.validate().valid, "{:?}", config.validate().errors);
        let slaves = config.nodes.len().saturating_sub(1);
        let mut rig = Self {
            service: ControllerService::new(config),
            client: NodeClient::new(VirtualChain::enumerated(slaves)),
            clock: ManualClock::new(),
            sink: RecordingSink::new(),
        };
        rig.service.start(&mut rig.sink);
        rig
    }

    fn humidity(&mut self, value: f64) {
        self.client.bus_mut().set_sensor(1, SensorType::Humidity, value);
    }

    /// One cycle at the current time, then advance one second.
    fn tick(&mut self) {
        self.service.tick(&mut self.client, &self.clock, &mut self.sink);
        self.clock.advance_ms(1_000);
    }

    fn port(&self, node: u8, port: u8) -> bool {
        self.client.bus().port_on(node, port).unwrap_or(false)
    }

    fn set_commands(&self) -> usize {
        self.client.bus().count(Command::SetPortState)
    }
}

fn mist_rule(hold: Option<f64>) -> Rule {
    Rule::new(
        "mist",
        "Mist when dry",
        RuleCondition::threshold("humidity", ComparisonOperator::Lt, 40.0, Some(5.0)),
        RuleAction::set_port(2, 1, true, hold),
    )
}

// ── Rules → ports ─────────────────────────────────────────────

#[test]
fn start_emits_started_event() {
    let rig = Rig::new(vec![mist_rule(None)]);
    assert!(matches!(
        rig.sink.events[0],
        ControllerEvent::Started { nodes: 2, rules: 1, schedules: 0 }
    ));
}

#[test]
fn rule_switches_port_and_releases_it() {
    let mut rig = Rig::new(vec![mist_rule(None)]);

    rig.humidity(50.0);
    rig.tick();
    assert!(!rig.port(2, 1));
    assert_eq!(rig.set_commands(), 0);

    rig.humidity(35.0);
    rig.tick();
    assert!(rig.port(2, 1));
    assert_eq!(
        rig.sink.count(|e| matches!(e, ControllerEvent::RuleTriggered { rule_id, .. } if rule_id == "mist")),
        1
    );
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            ControllerEvent::PortChanged { on: true, source: IntentSource::Rule(_), .. }
        )),
        1
    );

    // Inside the hysteresis band: stays on, nothing resent.
    rig.humidity(43.0);
    rig.tick();
    assert!(rig.port(2, 1));
    assert_eq!(rig.set_commands(), 1);

    rig.humidity(46.0);
    rig.tick();
    assert!(!rig.port(2, 1));
    assert_eq!(rig.set_commands(), 2);
    assert_eq!(rig.sink.count(|e| matches!(e, ControllerEvent::RuleReleased { .. })), 1);
}

#[test]
fn minimum_hold_keeps_port_on() {
    let mut rig = Rig::new(vec![mist_rule(Some(5.0))]);

    rig.humidity(30.0);
    rig.tick(); // t = 0
    assert!(rig.port(2, 1));

    rig.humidity(60.0);
    for _ in 0..4 {
        rig.tick(); // t = 1..4 s
        assert!(rig.port(2, 1));
    }
    assert!(matches!(
        rig.service.last_results()[0].reason,
        EvaluationReason::MinHold { remaining_secs: 1 }
    ));

    rig.tick(); // t = 5 s: lock expired, condition false
    assert!(!rig.port(2, 1));
}

#[test]
fn node_qualified_keys_and_calibration() {
    let mut config = ControllerConfig::default();
    let mut node2 = NodeConfig::with_default_ports(2);
    node2.sensors.push(SensorConfig {
        sensor_id: 1,
        sensor_type: SensorType::Temperature,
        name: "Canopy".into(),
        enabled: true,
        poll_interval_secs: 5,
        calibration_offset: Some(-1.5),
    });
    config.nodes.push(node2);
    config.rules.push(Rule::new(
        "fan",
        "Fan when hot",
        RuleCondition::threshold("node2.temperature", ComparisonOperator::Gt, 30.0, None),
        RuleAction::set_port(2, 2, true, None),
    ));
    let mut rig = Rig::with_config(config);

    rig.client.bus_mut().set_sensor(2, SensorType::Temperature, 31.0);
    rig.tick();
    // 31.0 - 1.5 is below the threshold.
    assert!(!rig.port(2, 2));
    assert_eq!(rig.service.last_snapshot().get("node2.temperature"), Some(29.5));
    // The bare key belongs to the first node.
    assert_eq!(rig.service.last_snapshot().get("temperature"), Some(25.0));

    rig.client.bus_mut().set_sensor(2, SensorType::Temperature, 32.0);
    rig.tick();
    assert!(rig.port(2, 2));
}

#[test]
fn disabled_sensor_is_not_reported() {
    let mut config = ControllerConfig::default();
    config.nodes[0].sensors.push(SensorConfig {
        sensor_id: 1,
        sensor_type: SensorType::Humidity,
        name: "Broken".into(),
        enabled: false,
        poll_interval_secs: 5,
        calibration_offset: None,
    });
    let mut rig = Rig::with_config(config);
    rig.tick();

    let snapshot = rig.service.last_snapshot();
    assert_eq!(snapshot.get("humidity"), None);
    assert_eq!(snapshot.get("node1.humidity"), None);
    assert_eq!(snapshot.get("node1.temperature"), Some(25.0));
}

// ── Schedules ─────────────────────────────────────────────────

fn lights() -> Schedule {
    let mut s = Schedule::template("lights", 2, 3);
    s.name = "Day lights".into();
    s.enabled = true;
    s
}

#[test]
fn schedule_follows_wall_clock() {
    let mut config = ControllerConfig::default();
    config.nodes.push(NodeConfig::with_default_ports(2));
    config.schedules.push(lights());
    let mut rig = Rig::with_config(config);

    // No wall time yet: nothing happens.
    rig.tick();
    assert_eq!(rig.set_commands(), 0);

    rig.clock.set_wall_time(DayOfWeek::Monday, 9, 0);
    rig.tick();
    assert!(rig.port(2, 3));

    rig.clock.set_wall_time(DayOfWeek::Monday, 21, 0);
    rig.tick();
    assert!(!rig.port(2, 3));
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            ControllerEvent::PortChanged { source: IntentSource::Schedule(_), .. }
        )),
        2
    );
}

#[test]
fn rule_overrides_schedule_and_release_yields_to_it() {
    let mut config = ControllerConfig::default();
    config.nodes.push(NodeConfig::with_default_ports(2));
    config.schedules.push(lights());
    config.rules.push(Rule::new(
        "dark",
        "Lights off when humid",
        RuleCondition::threshold("humidity", ComparisonOperator::Gt, 90.0, None),
        RuleAction::set_port(2, 3, false, None),
    ));
    let mut rig = Rig::with_config(config);
    rig.clock.set_wall_time(DayOfWeek::Tuesday, 12, 0);

    rig.humidity(95.0);
    rig.tick();
    assert!(!rig.port(2, 3));

    // Rule releases: the schedule's ON wins, not the inverse of the rule.
    rig.humidity(50.0);
    rig.tick();
    assert!(rig.port(2, 3));
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn unreachable_node_is_reported_once_and_recovers() {
    let mut rig = Rig::new(vec![]);
    rig.client.bus_mut().set_offline(2, true);
    rig.tick();
    rig.tick();
    assert_eq!(
        rig.sink.count(|e| matches!(e, ControllerEvent::NodeUnreachable { node_id: 2, .. })),
        1
    );
    assert_eq!(rig.service.last_snapshot().get("node2.humidity"), None);
    // Node 1 still read.
    assert_eq!(rig.service.last_snapshot().get("humidity"), Some(50.0));

    rig.client.bus_mut().set_offline(2, false);
    rig.tick();
    assert_eq!(rig.sink.count(|e| matches!(e, ControllerEvent::NodeRecovered { node_id: 2 })), 1);
}

#[test]
fn failed_port_command_is_retried_next_cycle() {
    // The rule targets node 3, which is on the bus but not polled.
    let mut config = ControllerConfig::default();
    config.rules.push(Rule::new(
        "heat",
        "Heat when cold",
        RuleCondition::threshold("temperature", ComparisonOperator::Lt, 30.0, None),
        RuleAction::set_port(3, 1, true, None),
    ));
    let mut rig = Rig::with_config(config);
    rig.client = NodeClient::new(VirtualChain::enumerated(2));
    rig.client.bus_mut().set_offline(3, true);

    rig.tick();
    assert_eq!(rig.sink.count(|e| matches!(e, ControllerEvent::PortCommandFailed { .. })), 1);
    assert_eq!(rig.service.dispatcher().confirmed(PortAddress::new(3, 1)), None);

    rig.client.bus_mut().set_offline(3, false);
    rig.tick();
    assert!(rig.port(3, 1));
    assert_eq!(rig.service.dispatcher().confirmed(PortAddress::new(3, 1)), Some(true));
}

#[test]
fn no_load_fault_latches_and_clears() {
    let mut rig = Rig::new(vec![mist_rule(None)]);
    rig.client.bus_mut().set_port_load(2, 1, 10);

    rig.humidity(30.0);
    rig.tick();
    let port = PortAddress::new(2, 1);
    assert!(rig.service.supervisor().has_fault(port, PortFault::NoLoad));
    assert_eq!(
        rig.sink.count(|e| matches!(e, ControllerEvent::FaultDetected { fault: PortFault::NoLoad, .. })),
        1
    );

    // Still faulted: reported once.
    rig.tick();
    assert_eq!(rig.sink.count(|e| matches!(e, ControllerEvent::FaultDetected { .. })), 1);

    // Switching off clears it.
    rig.humidity(60.0);
    rig.tick();
    assert!(!rig.service.supervisor().has_faults());
    assert_eq!(rig.sink.count(|e| matches!(e, ControllerEvent::FaultCleared { .. })), 1);
}

#[test]
fn port_that_drops_out_is_resent() {
    let mut rig = Rig::new(vec![mist_rule(None)]);
    rig.humidity(30.0);
    rig.tick();
    assert!(rig.port(2, 1));

    // Node loses the state behind our back.
    rig.client.bus_mut().node_mut(2).unwrap().port_mut(1).unwrap().on = false;
    rig.tick();
    assert!(
        rig.service
            .supervisor()
            .has_fault(PortAddress::new(2, 1), PortFault::StateMismatch)
    );

    rig.tick();
    assert!(rig.port(2, 1));
    assert!(!rig.service.supervisor().has_faults());
    assert_eq!(rig.set_commands(), 2);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_every_n_cycles() {
    let mut config = ControllerConfig::default();
    config.settings.controller.telemetry_interval_cycles = 2;
    let mut rig = Rig::with_config(config);
    for _ in 0..5 {
        rig.tick();
    }
    let cycles: Vec<u64> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            ControllerEvent::Telemetry(t) => Some(t.cycle),
            _ => None,
        })
        .collect();
    assert_eq!(cycles, [2, 4]);
}

// ── Commands and persistence ──────────────────────────────────

#[test]
fn upserted_rule_takes_effect_next_cycle() {
    let mut rig = Rig::new(vec![]);
    rig.humidity(30.0);
    rig.tick();
    assert!(!rig.port(2, 1));

    rig.service
        .handle_command(ControllerCommand::UpsertRule(mist_rule(None)), &mut rig.sink);
    rig.tick();
    assert!(rig.port(2, 1));
}

#[test]
fn removing_a_triggered_rule_releases_its_port() {
    let mut rig = Rig::new(vec![mist_rule(Some(600.0))]);
    rig.humidity(30.0);
    rig.tick();
    assert!(rig.port(2, 1));

    rig.service
        .handle_command(ControllerCommand::RemoveRule("mist".into()), &mut rig.sink);
    rig.tick();
    assert!(!rig.port(2, 1));
}

#[test]
fn rejected_config_keeps_running_one() {
    let mut rig = Rig::new(vec![mist_rule(None)]);
    let mut bad = rig.service.config().clone();
    bad.schedules.push({
        let mut s = lights();
        s.entries[0].time = "25:00".into();
        s
    });

    rig.service
        .handle_command(ControllerCommand::ReplaceConfig(Box::new(bad)), &mut rig.sink);
    let errors = rig.sink.events.iter().find_map(|e| match e {
        ControllerEvent::ConfigRejected { errors } => Some(errors.clone()),
        _ => None,
    });
    assert_eq!(
        errors,
        Some(vec!["Schedule lights has invalid time format: 25:00".to_string()])
    );
    assert!(rig.service.config().schedules.is_empty());
}

#[test]
fn rejected_rule_edit_never_blocks_saving() {
    let store = MemoryStore::new();
    let mut rig = Rig::new(vec![]);

    let mut nameless = mist_rule(None);
    nameless.name = String::new();
    rig.service
        .handle_command(ControllerCommand::UpsertRule(nameless), &mut rig.sink);
    assert_eq!(
        rig.sink.count(|e| matches!(e, ControllerEvent::ConfigRejected { .. })),
        1
    );
    assert!(rig.service.engine().is_empty());
    assert!(!rig.service.is_config_dirty());

    rig.service
        .handle_command(ControllerCommand::UpsertRule(mist_rule(Some(30.0))), &mut rig.sink);
    rig.service.force_save_if_dirty(&store);
    assert!(!rig.service.is_config_dirty());
    assert_eq!(store.load().unwrap().rules, vec![mist_rule(Some(30.0))]);
}

#[test]
fn reordered_rules_arbitrate_like_a_restart() {
    let on = mist_rule(None);
    let mut off = mist_rule(None);
    off.id = "dry-off".into();
    off.name = "Mister off".into();
    off.action = RuleAction::set_port(2, 1, false, None);

    let mut rig = Rig::new(vec![on.clone(), off.clone()]);
    rig.humidity(30.0);
    rig.tick();
    // Both trigger; the later rule wins the shared port.
    assert!(!rig.port(2, 1));

    let mut next = rig.service.config().clone();
    next.rules = vec![off, on];
    rig.service
        .handle_command(ControllerCommand::ReplaceConfig(Box::new(next)), &mut rig.sink);
    rig.tick();
    assert!(rig.port(2, 1));

    let ids: Vec<_> = rig.service.engine().rules().iter().map(|r| r.id.clone()).collect();
    let saved: Vec<_> = rig.service.config().rules.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, saved);
}

#[test]
fn replaced_config_applies_new_threshold() {
    let mut rig = Rig::new(vec![mist_rule(None)]);
    let mut next = rig.service.config().clone();
    next.settings.diagnostics.current_threshold_ma = 500;

    rig.service
        .handle_command(ControllerCommand::ReplaceConfig(Box::new(next)), &mut rig.sink);
    assert!(rig.sink.events.iter().any(|e| matches!(e, ControllerEvent::ConfigApplied)));

    rig.humidity(30.0);
    rig.tick();
    // 100 mA default load is now below the threshold.
    assert!(
        rig.service
            .supervisor()
            .has_fault(PortAddress::new(2, 1), PortFault::NoLoad)
    );
}

#[test]
fn auto_save_waits_for_quiet_period() {
    let store = MockConfigStore::new();
    let mut rig = Rig::new(vec![]);

    rig.service
        .handle_command(ControllerCommand::UpsertRule(mist_rule(None)), &mut rig.sink);
    assert!(rig.service.is_config_dirty());

    // Default: 1000 ms cycles, 5000 ms delay.
    for _ in 0..4 {
        rig.tick();
        assert!(!rig.service.auto_save_if_needed(&store));
    }
    rig.tick();
    assert!(rig.service.auto_save_if_needed(&store));
    assert!(!rig.service.is_config_dirty());
    assert_eq!(store.saves.get(), 1);
    assert_eq!(store.load().unwrap().rules.len(), 1);
}

#[test]
fn failed_save_stays_dirty() {
    let store = MockConfigStore::new();
    store.fail.set(true);
    let mut rig = Rig::new(vec![]);
    rig.service
        .handle_command(ControllerCommand::SaveConfig, &mut rig.sink);
    rig.tick();
    assert!(!rig.service.auto_save_if_needed(&store));
    assert!(rig.service.is_config_dirty());

    store.fail.set(false);
    rig.service.force_save_if_dirty(&store);
    assert!(!rig.service.is_config_dirty());
    assert_eq!(store.saves.get(), 1);
}
