//! Controller service: the hexagonal core.
//!
//! [`ControllerService`] owns the rules engine, the scheduler, the port
//! dispatcher and the port supervisor.  All I/O flows through the node
//! client and the port traits passed in at call sites, so the whole
//! service runs against the simulator or a mock bus in tests.
//!
//! ```text
//!   NodeClient ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │      ControllerService       │
//!   Clock ───────▶ │ Rules · Schedules · Dispatch │
//!                  │ Port supervisor              │ ◀──▶ ConfigPort
//!                  └──────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::protocol::{Bus, NodeClient, PortAddress};
use crate::rules::{EvaluationResult, RulesEngine, SensorSnapshot};
use crate::safety::{FaultChange, PortSupervisor};
use crate::schedule::Scheduler;

use super::commands::ControllerCommand;
use super::dispatch::Dispatcher;
use super::events::{ControllerEvent, TelemetryData};
use super::ports::{Clock, ConfigPort, EventSink};

// ───────────────────────────────────────────────────────────────
// ControllerService
// ───────────────────────────────────────────────────────────────

pub struct ControllerService {
    config: ControllerConfig,
    engine: RulesEngine,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    supervisor: PortSupervisor,
    snapshot: SensorSnapshot,
    results: Vec<EvaluationResult>,
    /// Nodes whose last sensor read failed.
    unreachable: BTreeSet<u8>,
    cycle_count: u64,
    config_dirty: bool,
    dirty_since_cycle: u64,
    /// Explicit save: skip the quiet period.
    save_requested: bool,
}

impl ControllerService {
    /// Build from an already validated configuration.
    pub fn new(config: ControllerConfig) -> Self {
        let engine = RulesEngine::with_rules(config.rules.iter().cloned());
        let scheduler = Scheduler::new(config.schedules.clone());
        let supervisor = PortSupervisor::new(&config.settings.diagnostics);

        Self {
            config,
            engine,
            scheduler,
            dispatcher: Dispatcher::new(),
            supervisor,
            snapshot: SensorSnapshot::new(),
            results: Vec::new(),
            unreachable: BTreeSet::new(),
            cycle_count: 0,
            config_dirty: false,
            dirty_since_cycle: 0,
            save_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        info!(
            "Controller started: {} node(s), {} rule(s), {} schedule(s)",
            self.config.nodes.len(),
            self.engine.len(),
            self.scheduler.schedules().len()
        );
        sink.emit(&ControllerEvent::Started {
            nodes: self.config.nodes.len(),
            rules: self.engine.len(),
            schedules: self.scheduler.schedules().len(),
        });
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one control cycle: read sensors → rules → schedules →
    /// dispatch → port supervision → telemetry.
    pub fn tick<B: Bus>(
        &mut self,
        client: &mut NodeClient<B>,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.cycle_count += 1;

        // 1. Sensors
        self.snapshot = self.poll_sensors(client, sink);

        // 2. Rules
        self.results = self.engine.evaluate(&self.snapshot, clock.now_ms());

        // 3. Schedules + 4. dispatch
        let decisions = self.scheduler.tick(clock.wall_time());
        let plan = self.dispatcher.plan(&decisions, &self.results);
        for (rule_id, rule_name) in plan.triggered {
            sink.emit(&ControllerEvent::RuleTriggered { rule_id, rule_name });
        }
        for (rule_id, rule_name) in plan.released {
            sink.emit(&ControllerEvent::RuleReleased { rule_id, rule_name });
        }
        self.dispatcher.apply(client, &plan.intents, sink);

        // 5. Port supervision
        self.supervise_ports(client, sink);

        // 6. Telemetry
        let every = self.config.settings.controller.telemetry_interval_cycles;
        if every > 0 && self.cycle_count % u64::from(every) == 0 {
            sink.emit(&ControllerEvent::Telemetry(self.build_telemetry()));
        }
    }

    /// Read every configured node into one snapshot.  Keys are the bare
    /// sensor name (first node wins) and `node<N>.<name>`.
    fn poll_sensors<B: Bus>(
        &mut self,
        client: &mut NodeClient<B>,
        sink: &mut impl EventSink,
    ) -> SensorSnapshot {
        let mut snapshot = SensorSnapshot::new();

        for node in &self.config.nodes {
            let readings = match client.sensor_values(node.node_id) {
                Ok(r) => {
                    if self.unreachable.remove(&node.node_id) {
                        info!("Node {} reachable again", node.node_id);
                        sink.emit(&ControllerEvent::NodeRecovered { node_id: node.node_id });
                    }
                    r
                }
                Err(error) => {
                    if self.unreachable.insert(node.node_id) {
                        warn!("Node {} unreachable: {error}", node.node_id);
                        sink.emit(&ControllerEvent::NodeUnreachable {
                            node_id: node.node_id,
                            error,
                        });
                    }
                    continue;
                }
            };

            for reading in readings {
                let Some(sensor_type) = reading.sensor_type else {
                    debug!(
                        "Node {}: skipping unknown sensor type 0x{:02x}",
                        node.node_id, reading.raw_type
                    );
                    continue;
                };
                let Some(offset) = node.sensor_offset(sensor_type) else {
                    continue;
                };
                let value = reading.value + offset;
                let key = sensor_type.key();
                snapshot.insert(format!("node{}.{key}", node.node_id), value);
                if snapshot.get(key).is_none() {
                    snapshot.insert(key, value);
                }
            }
        }

        snapshot
    }

    /// Read back every port confirmed ON; clear faults on ports now OFF.
    fn supervise_ports<B: Bus>(&mut self, client: &mut NodeClient<B>, sink: &mut impl EventSink) {
        let ports: Vec<(PortAddress, bool)> = self.dispatcher.confirmed_ports().collect();

        for (port, on) in ports {
            let changes = if on {
                match client.port_state(port.node_id, port.port_id) {
                    Ok(state) => {
                        if !state.on {
                            warn!("{port} reports OFF, resending");
                            self.dispatcher.forget(port);
                        }
                        self.supervisor.evaluate(port, &state)
                    }
                    Err(e) => {
                        debug!("{port} read-back failed: {e}");
                        continue;
                    }
                }
            } else {
                self.supervisor.clear_port(port)
            };
            emit_fault_changes(&changes, sink);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an administrative command between cycles.
    pub fn handle_command(&mut self, cmd: ControllerCommand, sink: &mut impl EventSink) {
        match cmd {
            ControllerCommand::UpsertRule(rule) => {
                let mut candidate = self.config.rules.clone();
                upsert_by_id(&mut candidate, rule.clone());
                let report = ControllerConfig {
                    rules: candidate,
                    ..self.config.clone()
                }
                .validate();
                if !report.valid {
                    warn!("Rule '{}' rejected: {}", rule.id, report.errors.join("; "));
                    sink.emit(&ControllerEvent::ConfigRejected { errors: report.errors });
                    return;
                }
                upsert_by_id(&mut self.config.rules, rule.clone());
                self.engine.upsert(rule);
                self.mark_config_dirty();
            }
            ControllerCommand::RemoveRule(rule_id) => {
                self.config.rules.retain(|r| r.id != rule_id);
                if self.engine.remove(&rule_id).is_some() {
                    self.mark_config_dirty();
                }
            }
            ControllerCommand::SetRuleEnabled { rule_id, enabled } => {
                if let Some(rule) = self.config.rules.iter_mut().find(|r| r.id == rule_id) {
                    rule.enabled = enabled;
                }
                if self.engine.set_enabled(&rule_id, enabled) {
                    self.mark_config_dirty();
                }
            }
            ControllerCommand::ReplaceConfig(new_config) => {
                let report = new_config.validate();
                if !report.valid {
                    warn!("Configuration rejected: {}", report.errors.join("; "));
                    sink.emit(&ControllerEvent::ConfigRejected { errors: report.errors });
                    return;
                }
                self.apply_config(*new_config);
                self.mark_config_dirty();
                info!("Configuration updated at runtime");
                sink.emit(&ControllerEvent::ConfigApplied);
            }
            ControllerCommand::ResetRuleState => {
                self.engine.reset();
                info!("Rule state reset");
            }
            ControllerCommand::SaveConfig => {
                self.mark_config_dirty();
                self.save_requested = true;
                info!("Explicit config save requested (will flush on next auto-save check)");
            }
        }
    }

    /// Swap configuration while keeping armed actions for rules that
    /// survive the change.
    fn apply_config(&mut self, config: ControllerConfig) {
        self.engine.replace_rules(config.rules.iter().cloned());

        self.scheduler.replace(config.schedules.clone());
        self.supervisor
            .set_threshold(config.settings.diagnostics.current_threshold_ma);
        self.config = config;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        TelemetryData {
            cycle: self.cycle_count,
            sensors: self.snapshot.clone(),
            triggered_rules: self.results.iter().filter(|r| r.triggered).count(),
            ports_on: self.dispatcher.ports_on(),
            faulted_ports: self.supervisor.faulted_ports(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn engine(&self) -> &RulesEngine {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn supervisor(&self) -> &PortSupervisor {
        &self.supervisor
    }

    /// Results of the last cycle, in rule order.
    pub fn last_results(&self) -> &[EvaluationResult] {
        &self.results
    }

    /// Sensor values read in the last cycle.
    pub fn last_snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    // ── Config dirty-flag management ──────────────────────────

    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_cycle = self.cycle_count;
        }
    }

    /// Persist once `auto_save_delay_ms` worth of cycles has passed since
    /// the first unsaved change.  Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let timing = &self.config.settings.controller;
        let cycles = self.cycle_count.saturating_sub(self.dirty_since_cycle);
        let elapsed_ms = cycles * u64::from(timing.poll_interval_ms);
        if !self.save_requested && elapsed_ms < u64::from(timing.auto_save_delay_ms) {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                info!("Config auto-saved");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {e}");
                false
            }
        }
    }

    /// Save now if dirty (call before shutdown).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => warn!("Config force-save failed: {e}"),
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

fn upsert_by_id(rules: &mut Vec<crate::rules::Rule>, rule: crate::rules::Rule) {
    match rules.iter_mut().find(|r| r.id == rule.id) {
        Some(slot) => *slot = rule,
        None => rules.push(rule),
    }
}

fn emit_fault_changes(changes: &[FaultChange], sink: &mut impl EventSink) {
    for c in changes {
        let event = if c.active {
            ControllerEvent::FaultDetected { port: c.port, fault: c.fault }
        } else {
            ControllerEvent::FaultCleared { port: c.port, fault: c.fault }
        };
        sink.emit(&event);
    }
}
