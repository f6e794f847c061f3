//! Port dispatch: turns schedule decisions and rule results into
//! `SET_PORT_STATE` commands.
//!
//! ```text
//!  schedules ──┐
//!  rules ──────┼──▶ plan() ──▶ one intent per port ──▶ apply() ──▶ NodeClient
//!  releases ───┘                 (last wins)            (only if ≠ confirmed)
//! ```
//!
//! Intents are collected in priority order: schedules, then triggered
//! rules, then releases.  A later intent for the same port replaces an
//! earlier one, so rules override schedules.  A release (a rule that
//! stopped triggering asks for the inverse of its action) is dropped if
//! anything else claimed the port this cycle.

use std::collections::BTreeMap;

use core::fmt;

use log::{info, warn};

use crate::protocol::{Bus, NodeClient, PortAddress};
use crate::rules::{EvaluationResult, RuleAction};
use crate::schedule::ScheduleDecision;

use super::events::ControllerEvent;
use super::ports::EventSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentSource {
    Schedule(String),
    Rule(String),
    /// Rule that stopped triggering.
    Release(String),
}

impl fmt::Display for IntentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(id) => write!(f, "schedule '{id}'"),
            Self::Rule(id) => write!(f, "rule '{id}'"),
            Self::Release(id) => write!(f, "release of rule '{id}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortIntent {
    pub port: PortAddress,
    pub state: bool,
    pub source: IntentSource,
}

/// Output of [`Dispatcher::plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// At most one intent per port.
    pub intents: Vec<PortIntent>,
    /// `(rule_id, rule_name)` of rules that started triggering.
    pub triggered: Vec<(String, String)>,
    /// `(rule_id, rule_name)` of rules that stopped triggering.
    pub released: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    /// Last state each node acknowledged.
    confirmed: BTreeMap<PortAddress, bool>,
    /// Rules that triggered last cycle: id → (name, action).
    triggered: BTreeMap<String, (String, RuleAction)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge this cycle's decisions into one intent per port.
    pub fn plan(&mut self, schedules: &[ScheduleDecision<'_>], results: &[EvaluationResult]) -> Plan {
        let mut plan = Plan::default();

        for d in schedules {
            claim(
                &mut plan.intents,
                PortIntent {
                    port: PortAddress::new(d.node_id, d.port_id),
                    state: d.state,
                    source: IntentSource::Schedule(d.schedule_id.to_string()),
                },
            );
        }

        let mut now_triggered = BTreeMap::new();
        for r in results {
            let Some(action) = r.action.as_ref().filter(|_| r.triggered) else {
                continue;
            };
            claim(
                &mut plan.intents,
                PortIntent {
                    port: action.target(),
                    state: action.desired_state(),
                    source: IntentSource::Rule(r.rule_id.clone()),
                },
            );
            if !self.triggered.contains_key(&r.rule_id) {
                plan.triggered.push((r.rule_id.clone(), r.rule_name.clone()));
            }
            now_triggered.insert(r.rule_id.clone(), (r.rule_name.clone(), action.clone()));
        }

        for (id, (name, action)) in &self.triggered {
            if now_triggered.contains_key(id) {
                continue;
            }
            plan.released.push((id.clone(), name.clone()));

            let port = action.target();
            if plan.intents.iter().any(|i| i.port == port) {
                continue;
            }
            plan.intents.push(PortIntent {
                port,
                state: !action.desired_state(),
                source: IntentSource::Release(id.clone()),
            });
        }

        self.triggered = now_triggered;
        plan
    }

    /// Send every intent that differs from the confirmed state.  A failed
    /// command leaves the cache untouched so the next cycle tries again.
    /// Returns the number of confirmed changes.
    pub fn apply<B: Bus>(
        &mut self,
        client: &mut NodeClient<B>,
        intents: &[PortIntent],
        sink: &mut impl EventSink,
    ) -> usize {
        let mut changed = 0;
        for intent in intents {
            if self.confirmed.get(&intent.port) == Some(&intent.state) {
                continue;
            }
            let PortAddress { node_id, port_id } = intent.port;
            match client.set_port_state(node_id, port_id, intent.state) {
                Ok(()) => {
                    info!(
                        "Dispatch: {} → {} ({})",
                        intent.port,
                        if intent.state { "ON" } else { "OFF" },
                        intent.source
                    );
                    self.confirmed.insert(intent.port, intent.state);
                    sink.emit(&ControllerEvent::PortChanged {
                        port: intent.port,
                        on: intent.state,
                        source: intent.source.clone(),
                    });
                    changed += 1;
                }
                Err(error) => {
                    warn!("Dispatch: {} command failed: {error}", intent.port);
                    sink.emit(&ControllerEvent::PortCommandFailed {
                        port: intent.port,
                        error,
                    });
                }
            }
        }
        changed
    }

    /// Last acknowledged state of a port, if any.
    pub fn confirmed(&self, port: PortAddress) -> Option<bool> {
        self.confirmed.get(&port).copied()
    }

    pub fn confirmed_ports(&self) -> impl Iterator<Item = (PortAddress, bool)> + '_ {
        self.confirmed.iter().map(|(&p, &on)| (p, on))
    }

    pub fn ports_on(&self) -> usize {
        self.confirmed.values().filter(|&&on| on).count()
    }

    /// Drop the cached state so the next intent for `port` is sent.
    pub fn forget(&mut self, port: PortAddress) {
        self.confirmed.remove(&port);
    }
}

/// Insert or replace the intent for the same port.
fn claim(intents: &mut Vec<PortIntent>, intent: PortIntent) {
    match intents.iter_mut().find(|i| i.port == intent.port) {
        Some(slot) => *slot = intent,
        None => intents.push(intent),
    }
}
