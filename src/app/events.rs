//! Outbound controller events.
//!
//! The [`ControllerService`](super::service::ControllerService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log, forward to a status view,
//! push to a broker.

use crate::error::Error;
use crate::protocol::PortAddress;
use crate::rules::SensorSnapshot;
use crate::safety::PortFault;

use super::dispatch::IntentSource;

/// Structured events emitted by the controller core.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The service has started (carries the loaded configuration size).
    Started {
        nodes: usize,
        rules: usize,
        schedules: usize,
    },

    /// A rule began triggering.
    RuleTriggered { rule_id: String, rule_name: String },

    /// A rule that was triggering stopped.
    RuleReleased { rule_id: String, rule_name: String },

    /// A node confirmed a port change.
    PortChanged {
        port: PortAddress,
        on: bool,
        source: IntentSource,
    },

    /// A port command failed after all retries; retried next cycle.
    PortCommandFailed { port: PortAddress, error: Error },

    /// A node stopped answering sensor reads.
    NodeUnreachable { node_id: u8, error: Error },

    /// A previously unreachable node answered again.
    NodeRecovered { node_id: u8 },

    FaultDetected { port: PortAddress, fault: PortFault },

    FaultCleared { port: PortAddress, fault: PortFault },

    /// A new configuration passed validation and is live.
    ConfigApplied,

    /// A configuration was refused; the running one is unchanged.
    ConfigRejected { errors: Vec<String> },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time view suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub cycle: u64,
    pub sensors: SensorSnapshot,
    /// Rules reported as triggered in the last cycle.
    pub triggered_rules: usize,
    /// Ports confirmed ON.
    pub ports_on: usize,
    /// Ports with at least one latched fault.
    pub faulted_ports: usize,
}
