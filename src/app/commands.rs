//! Inbound commands to the controller service.
//!
//! These represent administrative actions requested by the outside world
//! (status panel, serial console, config file watcher) that the
//! [`ControllerService`](super::service::ControllerService) applies between
//! cycles.

use crate::config::ControllerConfig;
use crate::rules::Rule;

#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Insert or replace a rule by id.
    UpsertRule(Rule),

    /// Remove a rule and its armed action.  Unknown ids are ignored.
    RemoveRule(String),

    SetRuleEnabled { rule_id: String, enabled: bool },

    /// Swap in a whole new configuration.  Rejected if it fails validation.
    ReplaceConfig(Box<ControllerConfig>),

    /// Forget armed actions and remembered sensor values.
    ResetRuleState,

    /// Persist the current config on the next auto-save check.
    SaveConfig,
}
