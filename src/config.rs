//! Controller configuration document.
//!
//! One serde-derived tree holds everything the controller needs: nodes
//! with their ports and sensors, rules, schedules and system settings.
//! The administrative form is JSON; the persisted form is a postcard blob
//! (see [`crate::adapters::store`]).  Nothing is accepted before
//! [`ControllerConfig::validate`] passes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::protocol::payload::{PortType, SensorType};
use crate::protocol::{CONTROLLER_NODE_ID, MAX_NODES};
use crate::rules::{Rule, RuleAction, RuleCondition};
use crate::schedule::{Schedule, TimeOfDay};

/// Written into new documents.
pub const CONFIG_VERSION: &str = "1.0";

/// Relay outputs per node.
pub const PORTS_PER_NODE: u8 = 5;

// ═══════════════════════════════════════════════════════════════
//  Document
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub version: String,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub settings: SystemSettings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            nodes: vec![NodeConfig::with_default_ports(CONTROLLER_NODE_ID)],
            rules: Vec::new(),
            schedules: Vec::new(),
            settings: SystemSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: u8,
    pub name: String,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NodeConfig {
    /// `Node N` with five unused, enabled ports and no sensors.
    pub fn with_default_ports(node_id: u8) -> Self {
        Self {
            node_id,
            name: format!("Node {node_id}"),
            ports: (1..=PORTS_PER_NODE)
                .map(|port_id| PortConfig {
                    port_id,
                    port_type: PortType::Unused,
                    name: format!("Port {port_id}"),
                    enabled: true,
                    description: None,
                })
                .collect(),
            sensors: Vec::new(),
            description: None,
        }
    }

    pub fn port(&self, port_id: u8) -> Option<&PortConfig> {
        self.ports.iter().find(|p| p.port_id == port_id)
    }

    /// Calibration offset for the first enabled sensor of `sensor_type`,
    /// or `None` if that sensor is configured and disabled.  Sensors not
    /// listed at all are read with no offset.
    pub fn sensor_offset(&self, sensor_type: SensorType) -> Option<f64> {
        match self.sensors.iter().find(|s| s.sensor_type == sensor_type) {
            Some(s) if !s.enabled => None,
            Some(s) => Some(s.calibration_offset.unwrap_or(0.0)),
            None => Some(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub port_id: u8,
    #[serde(rename = "type")]
    pub port_type: PortType,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub sensor_id: u8,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    pub name: String,
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u32,
    /// Added to every reading before it reaches the rules.
    #[serde(default)]
    pub calibration_offset: Option<f64>,
}

fn default_poll_interval_secs() -> u32 {
    5
}

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub controller: ControllerSettings,
    pub diagnostics: DiagnosticSettings,
}

/// Control loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Time between control cycles (milliseconds).
    pub poll_interval_ms: u32,
    /// Extra attempts for a request that fails or comes back corrupted.
    pub bus_retries: u8,
    /// Emit a telemetry event every N cycles.
    pub telemetry_interval_cycles: u32,
    /// Quiet time after the last config change before it is persisted.
    pub auto_save_delay_ms: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,       // 1 Hz
            bus_retries: 2,
            telemetry_interval_cycles: 60, // 1/min at 1 Hz
            auto_save_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticSettings {
    pub buzzer_enabled: bool,
    /// A port that is ON and draws less than this is faulted.
    pub current_threshold_ma: u16,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            buzzer_enabled: true,
            current_threshold_ma: 50,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Validation
// ═══════════════════════════════════════════════════════════════

/// Outcome of [`ControllerConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ControllerConfig {
    /// Parse the administrative JSON form.  Structure only; call
    /// [`validate`](Self::validate) before use.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn node(&self, node_id: u8) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Check everything the engine and dispatcher rely on.  A rule or
    /// schedule that targets an unconfigured node is allowed.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if self.version.trim().is_empty() {
            errors.push("Missing configuration version".to_string());
        }

        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.node_id) {
                errors.push(format!("Duplicate node ID: {}", node.node_id));
            }
            if node.node_id == 0 || node.node_id > MAX_NODES {
                errors.push(format!(
                    "Node ID {} out of range (1-{MAX_NODES})",
                    node.node_id
                ));
            }
            if node.name.trim().is_empty() {
                errors.push(format!("Node {} is missing a name", node.node_id));
            }
            let mut port_ids = HashSet::new();
            for port in &node.ports {
                if !port_ids.insert(port.port_id) {
                    errors.push(format!(
                        "Node {} has duplicate port ID: {}",
                        node.node_id, port.port_id
                    ));
                }
            }
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.is_empty() {
                errors.push("Rule with empty ID".to_string());
            }
            if !rule_ids.insert(rule.id.as_str()) {
                errors.push(format!("Duplicate rule ID: {}", rule.id));
            }
            if rule.name.trim().is_empty() {
                errors.push(format!("Rule {} is missing a name", rule.id));
            }
            validate_rule_body(rule, &mut errors);
        }

        let mut schedule_ids = HashSet::new();
        for schedule in &self.schedules {
            if !schedule_ids.insert(schedule.id.as_str()) {
                errors.push(format!("Duplicate schedule ID: {}", schedule.id));
            }
            if schedule.name.trim().is_empty() {
                errors.push(format!("Schedule {} is missing a name", schedule.id));
            }
            for entry in &schedule.entries {
                if TimeOfDay::parse(&entry.time).is_none() {
                    errors.push(format!(
                        "Schedule {} has invalid time format: {}",
                        schedule.id, entry.time
                    ));
                }
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

fn validate_rule_body(rule: &Rule, errors: &mut Vec<String>) {
    match &rule.condition {
        RuleCondition::Threshold(c) => {
            if c.sensor.is_empty() {
                errors.push(format!("Rule {} has no sensor", rule.id));
            }
            if !c.threshold.is_finite() {
                errors.push(format!("Rule {} has a non-finite threshold", rule.id));
            }
            if c.hysteresis.is_some_and(|h| h.is_nan() || h < 0.0) {
                errors.push(format!("Rule {} has negative hysteresis", rule.id));
            }
        }
    }
    match &rule.action {
        RuleAction::SetPort(a) => {
            if a.min_hold_secs.is_some_and(|s| s.is_nan() || s < 0.0) {
                errors.push(format!("Rule {} has negative minimum hold", rule.id));
            }
        }
    }
}
