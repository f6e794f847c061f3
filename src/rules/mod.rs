//! Rule evaluation engine.
//!
//! ```text
//!   snapshot, now
//!        │
//!        ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │ RulesEngine::evaluate                                     │
//!  │                                                           │
//!  │  for rule in registry (insertion order):                  │
//!  │    disabled?        → not triggered, "disabled"           │
//!  │    tracker locked?  → triggered, "min hold: Ns remaining" │
//!  │    condition::holds(rule, snapshot, previous)             │
//!  │    tracker.update(...) → "condition met" / "not met"      │
//!  │                                                           │
//!  │  previous.merge(snapshot)        (once, after all rules)  │
//!  └───────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!   Vec<EvaluationResult>
//! ```
//!
//! The engine is total and performs no I/O.  Every entry point takes
//! `&mut self`, so callers on several threads must share it behind one
//! lock.  Conflicts between rules that target the same port are not
//! resolved here; each result stands on its own.

pub mod condition;
pub mod model;
pub mod registry;
pub mod snapshot;
pub mod tracker;

use log::{debug, info};

pub use model::{
    ComparisonOperator, EvaluationReason, EvaluationResult, Rule, RuleAction, RuleCondition,
    SetPortAction, ThresholdCondition,
};
pub use registry::RuleRegistry;
pub use snapshot::SensorSnapshot;
pub use tracker::{ActionStateTracker, ActiveAction};

#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    registry: RuleRegistry,
    tracker: ActionStateTracker,
    /// Merged values from every completed cycle.  Read-only during a cycle.
    previous: SensorSnapshot,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut engine = Self::new();
        for rule in rules {
            engine.upsert(rule);
        }
        engine
    }

    // ── Administration ────────────────────────────────────────

    /// Insert or replace by id.  Replacing an enabled rule keeps any armed
    /// action; a disabled rule never keeps one.
    pub fn upsert(&mut self, rule: Rule) {
        if !rule.enabled {
            self.tracker.remove(&rule.id);
        }
        debug!("Rules: upsert '{}' ({})", rule.id, rule.name);
        self.registry.upsert(rule);
    }

    /// Remove a rule and its armed action.  Unknown ids are ignored.
    pub fn remove(&mut self, rule_id: &str) -> Option<Rule> {
        self.tracker.remove(rule_id);
        let removed = self.registry.remove(rule_id);
        if removed.is_some() {
            debug!("Rules: removed '{rule_id}'");
        }
        removed
    }

    /// Enable or disable.  Disabling drops the armed action.
    pub fn set_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        let found = self.registry.set_enabled(rule_id, enabled);
        if found && !enabled {
            self.tracker.remove(rule_id);
        }
        found
    }

    /// Replace the whole rule set, adopting the order of `rules`.  Armed
    /// actions survive for ids that remain and stay enabled; remembered
    /// sensor values are kept.
    pub fn replace_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        let mut registry = RuleRegistry::new();
        for rule in rules {
            registry.upsert(rule);
        }
        self.tracker
            .retain(|id| registry.get(id).is_some_and(|r| r.enabled));
        debug!("Rules: replaced rule set ({} rules)", registry.len());
        self.registry = registry;
    }

    /// Forget armed actions and remembered values; keep the rules.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.previous.clear();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn rules(&self) -> &[Rule] {
        self.registry.list()
    }

    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.registry.get(rule_id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn active_action(&self, rule_id: &str) -> Option<&ActiveAction> {
        self.tracker.get(rule_id)
    }

    pub fn active_actions(&self) -> impl Iterator<Item = &ActiveAction> {
        self.tracker.iter()
    }

    pub fn previous_values(&self) -> &SensorSnapshot {
        &self.previous
    }

    // ── Evaluation ────────────────────────────────────────────

    /// Run one cycle.  Returns one result per rule in registry order.
    pub fn evaluate(&mut self, snapshot: &SensorSnapshot, now_ms: u64) -> Vec<EvaluationResult> {
        let mut results = Vec::with_capacity(self.registry.len());

        for rule in self.registry.list() {
            if !rule.enabled {
                results.push(EvaluationResult {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    triggered: false,
                    action: None,
                    reason: EvaluationReason::Disabled,
                });
                continue;
            }

            if let Some(active) = self.tracker.locked(&rule.id, now_ms) {
                results.push(EvaluationResult {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    triggered: true,
                    action: Some(active.action.clone()),
                    reason: EvaluationReason::MinHold {
                        remaining_secs: active.remaining_secs(now_ms),
                    },
                });
                continue;
            }

            let holds = condition::holds(&rule.condition, snapshot, &self.previous);
            let was_armed = self.tracker.get(&rule.id).is_some();
            self.tracker.update(&rule.id, holds, &rule.action, now_ms);

            match (was_armed, holds) {
                (false, true) => info!("Rules: '{}' triggered", rule.name),
                (true, false) => info!("Rules: '{}' released", rule.name),
                _ => {}
            }

            results.push(EvaluationResult {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                triggered: holds,
                action: holds.then(|| rule.action.clone()),
                reason: if holds {
                    EvaluationReason::ConditionMet
                } else {
                    EvaluationReason::ConditionNotMet
                },
            });
        }

        self.previous.merge(snapshot);
        results
    }
}
