//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing controller events to the `log`
//! facade, one line per event, with a short tag in front so the console
//! stays greppable.

use log::{info, warn};

use crate::app::events::ControllerEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ControllerEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControllerEvent) {
        self.emitted += 1;
        match event {
            ControllerEvent::Started { nodes, rules, schedules } => {
                info!("START | nodes={nodes} rules={rules} schedules={schedules}");
            }
            ControllerEvent::RuleTriggered { rule_id, rule_name } => {
                info!("RULE  | '{rule_name}' ({rule_id}) triggered");
            }
            ControllerEvent::RuleReleased { rule_id, rule_name } => {
                info!("RULE  | '{rule_name}' ({rule_id}) released");
            }
            ControllerEvent::PortChanged { port, on, source } => {
                info!("PORT  | {port} -> {} by {source}", if *on { "ON" } else { "OFF" });
            }
            ControllerEvent::PortCommandFailed { port, error } => {
                warn!("PORT  | {port} command failed: {error}");
            }
            ControllerEvent::NodeUnreachable { node_id, error } => {
                warn!("NODE  | {node_id} unreachable: {error}");
            }
            ControllerEvent::NodeRecovered { node_id } => {
                info!("NODE  | {node_id} recovered");
            }
            ControllerEvent::FaultDetected { port, fault } => {
                warn!("FAULT | {port}: {fault}");
            }
            ControllerEvent::FaultCleared { port, fault } => {
                info!("FAULT | {port}: {fault} cleared");
            }
            ControllerEvent::ConfigApplied => {
                info!("CONFIG | applied");
            }
            ControllerEvent::ConfigRejected { errors } => {
                warn!("CONFIG | rejected: {}", errors.join("; "));
            }
            ControllerEvent::Telemetry(t) => {
                let sensors: Vec<String> = t
                    .sensors
                    .iter()
                    .filter(|(k, _)| !k.contains('.'))
                    .map(|(k, v)| format!("{k}={v:.1}"))
                    .collect();
                info!(
                    "TELEM | cycle={} | {} | triggered={} ports_on={} faulted={}",
                    t.cycle,
                    sensors.join(" "),
                    t.triggered_rules,
                    t.ports_on,
                    t.faulted_ports,
                );
            }
        }
    }
}
