//! Condition evaluation - per-step gating predicates

use nurture_common::config::ConditionPolicy;
use tracing::warn;

/// A typed step condition decoded from the step's conditions map
#[derive(Debug, Clone, PartialEq)]
pub enum StepCondition {
    /// Requires the lead to have (or not have) at least one recorded demo view
    DemoViewed(bool),
    /// A predicate this evaluator does not recognize; resolution follows the
    /// configured [`ConditionPolicy`]
    Unknown { key: String },
}

/// Queryable facts about a lead, loaded before gating
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadFacts {
    pub demo_views: i64,
}

/// Decode a step's conditions map into typed conditions
///
/// A non-object or empty value decodes to no conditions. A recognized key
/// with a malformed value is treated as unknown rather than dropped, so the
/// configured policy still applies to it.
pub fn parse_conditions(value: &serde_json::Value) -> Vec<StepCondition> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };

    map.iter()
        .map(|(key, value)| match (key.as_str(), value.as_bool()) {
            ("demo_viewed", Some(required)) => StepCondition::DemoViewed(required),
            _ => StepCondition::Unknown { key: key.clone() },
        })
        .collect()
}

/// Evaluate a step's conditions against lead facts
///
/// An empty condition list is always met.
pub fn conditions_met(
    conditions: &[StepCondition],
    facts: &LeadFacts,
    policy: ConditionPolicy,
) -> bool {
    conditions.iter().all(|condition| match condition {
        StepCondition::DemoViewed(required) => (facts.demo_views > 0) == *required,
        StepCondition::Unknown { key } => {
            warn!(key = %key, "Unrecognized step condition");
            matches!(policy, ConditionPolicy::FailOpen)
        }
    })
}

/// Whether any condition needs the lead's demo-view count
pub fn needs_demo_views(conditions: &[StepCondition]) -> bool {
    conditions
        .iter()
        .any(|c| matches!(c, StepCondition::DemoViewed(_)))
}
