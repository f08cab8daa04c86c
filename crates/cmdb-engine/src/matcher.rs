//! Pure rule evaluation and binding planning.
//!
//! Nothing in this module touches storage: the rule engine loads rules,
//! instances and bindings, hands them to [`plan_bindings`], and persists
//! the plan it gets back.

use std::collections::HashSet;

use cmdb_core::models::binding::{ResourceBinding, ResourceType};
use cmdb_core::models::instance::{Instance, TAGS_ATTRIBUTE};
use cmdb_core::models::rule::{BindingRule, Operator, RuleCondition};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

const ATTRIBUTES_PREFIX: &str = "attributes.";
const TAG_PREFIX: &str = "tag.";

/// Resolve a condition field against an instance.
///
/// Scalars render as their display form. Lists, maps, nulls and paths
/// that do not resolve all yield an empty string.
pub fn field_value(instance: &Instance, field: &str) -> String {
    match field {
        "name" => return instance.asset_name.clone(),
        "asset_id" => return instance.asset_id.clone(),
        "model_uid" => return instance.model_uid.clone(),
        _ => {}
    }

    let value = if let Some(key) = field.strip_prefix(ATTRIBUTES_PREFIX) {
        instance.attribute(key)
    } else if let Some(key) = field.strip_prefix(TAG_PREFIX) {
        instance.tag(key)
    } else {
        None
    };

    value
        .and_then(|v| v.to_scalar_string())
        .unwrap_or_default()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

/// Evaluate a single condition. Unknown operators and invalid regular
/// expressions never match.
pub fn condition_matches(instance: &Instance, condition: &RuleCondition) -> bool {
    let Some(operator) = condition.parsed_operator() else {
        return false;
    };
    let actual = field_value(instance, &condition.field);
    let expected = condition.value.as_str();

    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Contains => actual.contains(expected),
        Operator::Regex => Regex::new(expected).is_ok_and(|re| re.is_match(&actual)),
        Operator::In => split_list(expected).any(|v| v == actual),
        Operator::NotIn => !split_list(expected).any(|v| v == actual),
        Operator::Exists => !actual.is_empty(),
    }
}

/// All conditions must hold. A rule without conditions matches nothing.
pub fn rule_matches(instance: &Instance, rule: &BindingRule) -> bool {
    !rule.conditions.is_empty()
        && rule
            .conditions
            .iter()
            .all(|condition| condition_matches(instance, condition))
}

/// Order rules for evaluation: lower priority value first, then oldest.
pub fn sort_rules(rules: &mut [BindingRule]) {
    rules.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// First enabled rule matching the instance. `rules` must already be in
/// evaluation order (see [`sort_rules`]).
pub fn first_match<'a>(rules: &'a [BindingRule], instance: &Instance) -> Option<&'a BindingRule> {
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .find(|rule| rule_matches(instance, rule))
}

/// A binding the rule engine intends to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedBinding {
    pub rule_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub resource_id: Uuid,
}

/// Compute the bindings a rule run should create.
///
/// Each instance is bound at most once per run, by the first enabled rule
/// that matches it and whose environment does not already hold it.
pub fn plan_bindings(
    rules: &[BindingRule],
    instances: &[Instance],
    existing: &[ResourceBinding],
) -> Vec<PlannedBinding> {
    let mut ordered = rules.to_vec();
    sort_rules(&mut ordered);

    let mut bound: HashSet<(Option<Uuid>, Uuid)> = existing
        .iter()
        .filter(|b| b.resource_type == ResourceType::Instance)
        .map(|b| (b.env_id, b.resource_id))
        .collect();

    let mut plan = Vec::new();
    for instance in instances {
        let Some(rule) = ordered.iter().find(|rule| {
            rule.enabled
                && !bound.contains(&(rule.env_id, instance.id))
                && rule_matches(instance, rule)
        }) else {
            continue;
        };
        bound.insert((rule.env_id, instance.id));
        plan.push(PlannedBinding {
            rule_id: rule.id,
            node_id: rule.node_id,
            env_id: rule.env_id,
            resource_id: instance.id,
        });
    }
    plan
}
