//! Condition evaluation with hysteresis.
//!
//! Hysteresis only widens the threshold while the condition was true on
//! the previous cycle, measured against the *unmodified* threshold.  It
//! makes releasing harder; it never makes triggering easier.

use super::model::{ComparisonOperator, RuleCondition, ThresholdCondition};
use super::snapshot::SensorSnapshot;

/// Does `condition` hold for `current`, given the previous cycle's values?
///
/// An unknown sensor never satisfies a condition.
pub fn holds(condition: &RuleCondition, current: &SensorSnapshot, previous: &SensorSnapshot) -> bool {
    match condition {
        RuleCondition::Threshold(c) => threshold_holds(c, current, previous),
    }
}

fn threshold_holds(c: &ThresholdCondition, current: &SensorSnapshot, previous: &SensorSnapshot) -> bool {
    let Some(value) = current.get(&c.sensor) else {
        return false;
    };

    let was_true = previous
        .get(&c.sensor)
        .is_some_and(|prev| compare(prev, c.operator, c.threshold));

    let band = c.hysteresis.unwrap_or(0.0);
    let effective = if was_true && band > 0.0 {
        match c.operator {
            ComparisonOperator::Lt | ComparisonOperator::Lte => c.threshold + band,
            ComparisonOperator::Gt | ComparisonOperator::Gte => c.threshold - band,
            ComparisonOperator::Eq | ComparisonOperator::Neq => c.threshold,
        }
    } else {
        c.threshold
    };

    compare(value, c.operator, effective)
}

/// Plain numeric comparison `value <op> threshold`.
#[allow(clippy::float_cmp)]
pub fn compare(value: f64, operator: ComparisonOperator, threshold: f64) -> bool {
    match operator {
        ComparisonOperator::Lt => value < threshold,
        ComparisonOperator::Gt => value > threshold,
        ComparisonOperator::Lte => value <= threshold,
        ComparisonOperator::Gte => value >= threshold,
        ComparisonOperator::Eq => value == threshold,
        ComparisonOperator::Neq => value != threshold,
    }
}
