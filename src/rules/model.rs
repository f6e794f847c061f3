//! Rule definitions and per-cycle evaluation results.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::PortAddress;

// ═══════════════════════════════════════════════════════════════
//  Rule definition
// ═══════════════════════════════════════════════════════════════

/// A named, independently enabled condition → action binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique within the registry.  Upserting an existing id replaces it.
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub condition: RuleCondition,
    pub action: RuleAction,
    #[serde(default)]
    pub description: Option<String>,
}

impl Rule {
    /// Enabled rule with no description.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        condition: RuleCondition,
        action: RuleAction,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            condition,
            action,
            description: None,
        }
    }
}

/// What a rule watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Threshold(ThresholdCondition),
}

impl RuleCondition {
    /// Convenience constructor for the common case.
    pub fn threshold(
        sensor: impl Into<String>,
        operator: ComparisonOperator,
        threshold: f64,
        hysteresis: Option<f64>,
    ) -> Self {
        Self::Threshold(ThresholdCondition {
            sensor: sensor.into(),
            operator,
            threshold,
            hysteresis,
        })
    }

    /// Snapshot key this condition reads.
    pub fn sensor(&self) -> &str {
        match self {
            Self::Threshold(c) => &c.sensor,
        }
    }
}

/// `sensor <operator> threshold`, with an optional hysteresis band that
/// applies only while the condition was true on the previous cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCondition {
    pub sensor: String,
    pub operator: ComparisonOperator,
    #[serde(alias = "value")]
    pub threshold: f64,
    #[serde(default)]
    pub hysteresis: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "lt", alias = "<")]
    Lt,
    #[serde(rename = "gt", alias = ">")]
    Gt,
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    #[serde(rename = "gte", alias = ">=")]
    Gte,
    #[serde(rename = "eq", alias = "==")]
    Eq,
    #[serde(rename = "neq", alias = "!=")]
    Neq,
}

impl ComparisonOperator {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Eq => "==",
            Self::Neq => "!=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What a rule does while its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    SetPort(SetPortAction),
}

impl RuleAction {
    pub fn set_port(node_id: u8, port_id: u8, state: bool, min_hold_secs: Option<f64>) -> Self {
        Self::SetPort(SetPortAction {
            node_id,
            port_id,
            state,
            min_hold_secs,
        })
    }

    /// Port this action drives.
    pub fn target(&self) -> PortAddress {
        match self {
            Self::SetPort(a) => PortAddress::new(a.node_id, a.port_id),
        }
    }

    /// State this action asks for.
    pub fn desired_state(&self) -> bool {
        match self {
            Self::SetPort(a) => a.state,
        }
    }

    /// Minimum hold in milliseconds.  Missing or negative means none.
    pub fn min_hold_ms(&self) -> u64 {
        match self {
            Self::SetPort(a) => {
                let secs = a.min_hold_secs.unwrap_or(0.0).max(0.0);
                (secs * 1000.0) as u64
            }
        }
    }
}

/// Drive one relay output to `state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetPortAction {
    pub node_id: u8,
    pub port_id: u8,
    pub state: bool,
    #[serde(default, alias = "min_duration_secs")]
    pub min_hold_secs: Option<f64>,
}

// ═══════════════════════════════════════════════════════════════
//  Evaluation output
// ═══════════════════════════════════════════════════════════════

/// One rule's decision for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub rule_id: String,
    pub rule_name: String,
    pub triggered: bool,
    /// `Some` exactly when `triggered`.
    pub action: Option<RuleAction>,
    pub reason: EvaluationReason,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationReason {
    Disabled,
    /// Armed action still inside its minimum hold window.
    MinHold { remaining_secs: u64 },
    ConditionMet,
    ConditionNotMet,
}

impl fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::MinHold { remaining_secs } => write!(f, "min hold: {remaining_secs}s remaining"),
            Self::ConditionMet => f.write_str("condition met"),
            Self::ConditionNotMet => f.write_str("condition not met"),
        }
    }
}
