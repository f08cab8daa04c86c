//! Binding rule domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmdbError, CmdbResult};

/// Comparison applied by a [`RuleCondition`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    Regex,
    In,
    NotIn,
    Exists,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Exists => "exists",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            "in" => Ok(Self::In),
            "not_in" => Ok(Self::NotIn),
            "exists" => Ok(Self::Exists),
            other => Err(CmdbError::validation(format!("invalid operator: {other}"))),
        }
    }
}

/// One `{field, operator, value}` clause.
///
/// The operator is kept as written so that rules stored with an operator
/// this build does not know still load; such conditions never match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleCondition {
    /// `name`, `asset_id`, `model_uid`, `attributes.<key>` or `tag.<key>`.
    pub field: String,
    pub operator: String,
    pub value: String,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
        }
    }

    pub fn parsed_operator(&self) -> Option<Operator> {
        self.operator.parse().ok()
    }
}

/// Declarative rule assigning matching resources to a service tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub name: String,
    /// Lower values are evaluated first.
    pub priority: i64,
    /// AND-combined, evaluated in order.
    pub conditions: Vec<RuleCondition>,
    pub enabled: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBindingRule {
    pub tenant_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub name: String,
    pub priority: i64,
    pub conditions: Vec<RuleCondition>,
    pub enabled: bool,
    pub description: String,
}

fn validate_conditions(conditions: &[RuleCondition]) -> CmdbResult<()> {
    if conditions.is_empty() {
        return Err(CmdbError::validation("rule conditions cannot be empty"));
    }
    for condition in conditions {
        if condition.field.trim().is_empty() {
            return Err(CmdbError::validation("rule condition field cannot be empty"));
        }
        condition.operator.parse::<Operator>()?;
    }
    Ok(())
}

impl CreateBindingRule {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.name.trim().is_empty() {
            return Err(CmdbError::validation("rule name cannot be empty"));
        }
        if self.node_id.is_nil() {
            return Err(CmdbError::validation("rule target node cannot be empty"));
        }
        if self.tenant_id.is_nil() {
            return Err(CmdbError::validation("rule tenant id cannot be empty"));
        }
        validate_conditions(&self.conditions)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBindingRule {
    pub node_id: Option<Uuid>,
    pub env_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub conditions: Option<Vec<RuleCondition>>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
}

impl UpdateBindingRule {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CmdbError::validation("rule name cannot be empty"));
        }
        if self.node_id.is_some_and(|n| n.is_nil()) {
            return Err(CmdbError::validation("rule target node cannot be empty"));
        }
        match &self.conditions {
            Some(conditions) => validate_conditions(conditions),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub node_id: Option<Uuid>,
    pub enabled: Option<bool>,
    pub name: Option<String>,
}

/// Outcome of evaluating an instance against the enabled rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleMatchResult {
    pub rule_id: Option<Uuid>,
    pub node_id: Option<Uuid>,
    pub resource_id: Uuid,
    pub matched: bool,
    pub reason: String,
}
