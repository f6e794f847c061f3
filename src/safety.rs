//! Port current supervisor.
//!
//! Each cycle the controller reads back every port it believes is ON and
//! hands the reported state here.  Faults are latched per port in a small
//! bitmask so several can be active at once.
//!
//! ## Fault lifecycle
//!
//! 1. A port confirmed ON draws less than the threshold → `NoLoad` set.
//!    (Burnt-out heater, unplugged pump, blown fuse.)
//! 2. A port confirmed ON reports OFF → `StateMismatch` set.  The caller
//!    drops its confirmed-state cache so the command is sent again.
//! 3. Each later observation re-evaluates; a condition that no longer
//!    holds clears its bit.
//! 4. Switching the port OFF clears every fault on it.

use std::collections::BTreeMap;

use core::fmt;

use log::{error, info};

use crate::config::DiagnosticSettings;
use crate::protocol::PortAddress;
use crate::protocol::payload::PortState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortFault {
    /// ON, but drawing less than the current threshold.
    NoLoad,
    /// Node reports a different state from the one last confirmed.
    StateMismatch,
}

impl PortFault {
    pub const ALL: [Self; 2] = [Self::NoLoad, Self::StateMismatch];

    pub const fn mask(self) -> u8 {
        match self {
            Self::NoLoad => 0b01,
            Self::StateMismatch => 0b10,
        }
    }
}

impl fmt::Display for PortFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLoad => write!(f, "no load current"),
            Self::StateMismatch => write!(f, "state mismatch"),
        }
    }
}

/// A fault bit that flipped during the last call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultChange {
    pub port: PortAddress,
    pub fault: PortFault,
    pub active: bool,
}

pub struct PortSupervisor {
    threshold_ma: u16,
    /// Latched fault bitmask per port.  Ports without faults are absent.
    faults: BTreeMap<PortAddress, u8>,
}

impl PortSupervisor {
    pub fn new(settings: &DiagnosticSettings) -> Self {
        Self {
            threshold_ma: settings.current_threshold_ma,
            faults: BTreeMap::new(),
        }
    }

    pub fn set_threshold(&mut self, threshold_ma: u16) {
        self.threshold_ma = threshold_ma;
    }

    /// Check a port the controller believes is ON against what the node
    /// reports.
    pub fn evaluate(&mut self, port: PortAddress, reported: &PortState) -> Vec<FaultChange> {
        let mut changes = Vec::new();

        // ── Commanded ON, node says OFF ───────────────────────────
        self.eval_fault(port, PortFault::StateMismatch, !reported.on, &mut changes);

        // ── Load current (only meaningful while actually on) ─────
        self.eval_fault(
            port,
            PortFault::NoLoad,
            reported.on && reported.current_ma < self.threshold_ma,
            &mut changes,
        );

        changes
    }

    /// The port was switched OFF: nothing to supervise.
    pub fn clear_port(&mut self, port: PortAddress) -> Vec<FaultChange> {
        let mut changes = Vec::new();
        for fault in PortFault::ALL {
            self.eval_fault(port, fault, false, &mut changes);
        }
        changes
    }

    /// Drop all latched faults without reporting.
    pub fn reset(&mut self) {
        self.faults.clear();
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn has_fault(&self, port: PortAddress, fault: PortFault) -> bool {
        self.faults.get(&port).is_some_and(|m| m & fault.mask() != 0)
    }

    /// Number of ports with at least one fault.
    pub fn faulted_ports(&self) -> usize {
        self.faults.len()
    }

    /// Active faults, ordered by port.
    pub fn active(&self) -> impl Iterator<Item = (PortAddress, PortFault)> + '_ {
        self.faults.iter().flat_map(|(&port, &mask)| {
            PortFault::ALL
                .into_iter()
                .filter(move |f| mask & f.mask() != 0)
                .map(move |f| (port, f))
        })
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(
        &mut self,
        port: PortAddress,
        fault: PortFault,
        condition: bool,
        changes: &mut Vec<FaultChange>,
    ) {
        let mask = self.faults.get(&port).copied().unwrap_or(0);
        let was_set = mask & fault.mask() != 0;

        if condition && !was_set {
            error!("PORT FAULT SET: {port}: {fault}");
            self.faults.insert(port, mask | fault.mask());
            changes.push(FaultChange { port, fault, active: true });
        } else if !condition && was_set {
            info!("PORT FAULT CLEARED: {port}: {fault}");
            let rest = mask & !fault.mask();
            if rest == 0 {
                self.faults.remove(&port);
            } else {
                self.faults.insert(port, rest);
            }
            changes.push(FaultChange { port, fault, active: false });
        }
    }
}
