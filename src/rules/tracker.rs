//! Minimum-hold state machine.
//!
//! ```text
//!              holds                      now ≥ min_end
//!  Inactive ─────────▶ Locked ──────────────────────▶ Unlocked-Active
//!     ▲                (reported triggered,            │        │
//!     │                 condition not evaluated)       │ holds  │ !holds
//!     │                                                ◀────────┘
//!     └────────────────────────────────────────────────────────┘
//! ```
//!
//! A zero hold arms straight into Unlocked-Active.  Removing or disabling
//! the rule drops the record immediately.

use std::collections::BTreeMap;

use super::model::RuleAction;

/// Armed action for one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAction {
    pub rule_id: String,
    pub start_ms: u64,
    /// `start_ms + min_hold`; never earlier than `start_ms`.
    pub min_end_ms: u64,
    /// Action as it was when armed.
    pub action: RuleAction,
}

impl ActiveAction {
    pub fn is_locked(&self, now_ms: u64) -> bool {
        now_ms < self.min_end_ms
    }

    /// Whole seconds left in the hold window, rounded up.
    pub fn remaining_secs(&self, now_ms: u64) -> u64 {
        self.min_end_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionStateTracker {
    active: BTreeMap<String, ActiveAction>,
}

impl ActionStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rule_id: &str) -> Option<&ActiveAction> {
        self.active.get(rule_id)
    }

    /// The armed action for `rule_id` if its hold window is still open.
    pub fn locked(&self, rule_id: &str, now_ms: u64) -> Option<&ActiveAction> {
        self.active.get(rule_id).filter(|a| a.is_locked(now_ms))
    }

    /// Apply one cycle's outcome for a rule that is not locked.
    ///
    /// Arms a fresh record when the condition starts holding, keeps an
    /// existing one while it holds, and drops it once it stops holding.
    pub fn update(&mut self, rule_id: &str, holds: bool, action: &RuleAction, now_ms: u64) {
        if holds {
            if !self.active.contains_key(rule_id) {
                let min_end_ms = now_ms.saturating_add(action.min_hold_ms());
                self.active.insert(
                    rule_id.to_string(),
                    ActiveAction {
                        rule_id: rule_id.to_string(),
                        start_ms: now_ms,
                        min_end_ms,
                        action: action.clone(),
                    },
                );
            }
        } else if self.active.get(rule_id).is_some_and(|a| !a.is_locked(now_ms)) {
            self.active.remove(rule_id);
        }
    }

    pub fn remove(&mut self, rule_id: &str) -> Option<ActiveAction> {
        self.active.remove(rule_id)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Keep only the records whose rule id passes `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.active.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Armed actions in rule-id order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveAction> {
        self.active.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(hold: Option<f64>) -> RuleAction {
        RuleAction::set_port(2, 1, true, hold)
    }

    #[test]
    fn arms_with_hold_window() {
        let mut t = ActionStateTracker::new();
        t.update("r", true, &action(Some(60.0)), 1_000);
        let a = t.get("r").unwrap();
        assert_eq!(a.start_ms, 1_000);
        assert_eq!(a.min_end_ms, 61_000);
        assert!(t.locked("r", 60_999).is_some());
        assert!(t.locked("r", 61_000).is_none());
    }

    #[test]
    fn zero_hold_is_never_locked() {
        let mut t = ActionStateTracker::new();
        t.update("r", true, &action(None), 5);
        assert!(t.locked("r", 5).is_none());
        t.update("r", false, &action(None), 6);
        assert!(t.is_empty());
    }

    #[test]
    fn holding_condition_keeps_original_start() {
        let mut t = ActionStateTracker::new();
        t.update("r", true, &action(Some(1.0)), 0);
        t.update("r", true, &action(Some(1.0)), 5_000);
        assert_eq!(t.get("r").unwrap().start_ms, 0);
    }

    #[test]
    fn release_waits_for_hold_expiry() {
        let mut t = ActionStateTracker::new();
        t.update("r", true, &action(Some(10.0)), 0);
        t.update("r", false, &action(Some(10.0)), 9_999);
        assert!(t.get("r").is_some());
        t.update("r", false, &action(Some(10.0)), 10_000);
        assert!(t.get("r").is_none());
    }

    #[test]
    fn remaining_rounds_up() {
        let a = ActiveAction {
            rule_id: "r".into(),
            start_ms: 0,
            min_end_ms: 60_000,
            action: action(Some(60.0)),
        };
        assert_eq!(a.remaining_secs(10_000), 50);
        assert_eq!(a.remaining_secs(10_001), 50);
        assert_eq!(a.remaining_secs(59_999), 1);
        assert_eq!(a.remaining_secs(70_000), 0);
    }

    #[test]
    fn iteration_is_ordered_by_rule_id() {
        let mut t = ActionStateTracker::new();
        for id in ["mist", "fan", "heat"] {
            t.update(id, true, &action(None), 0);
        }
        let ids: Vec<_> = t.iter().map(|a| a.rule_id.as_str()).collect();
        assert_eq!(ids, ["fan", "heat", "mist"]);

        t.retain(|id| id != "heat");
        let ids: Vec<_> = t.iter().map(|a| a.rule_id.as_str()).collect();
        assert_eq!(ids, ["fan", "mist"]);
    }
}
