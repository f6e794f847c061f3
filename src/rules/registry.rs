use super::model::Rule;

/// Rule definitions in insertion order.
///
/// Unknown ids are a no-op everywhere; nothing here fails.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace in place when the id already exists.
    /// Returns the replaced rule.
    pub fn upsert(&mut self, rule: Rule) -> Option<Rule> {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => Some(core::mem::replace(slot, rule)),
            None => {
                self.rules.push(rule);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Rule> {
        let idx = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(idx))
    }

    /// Returns `false` when no rule has this id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn list(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
