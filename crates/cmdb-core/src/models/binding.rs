//! Resource binding domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CmdbError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Instance,
    Asset,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(Self::Instance),
            "asset" => Ok(Self::Asset),
            other => Err(CmdbError::validation(format!(
                "invalid resource type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BindType {
    Manual,
    Rule,
}

impl BindType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Rule => "rule",
        }
    }
}

impl FromStr for BindType {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "rule" => Ok(Self::Rule),
            other => Err(CmdbError::validation(format!("invalid bind type: {other}"))),
        }
    }
}

/// Attachment of a resource to a service tree node within an environment.
///
/// A resource is bound at most once per `(tenant, env, resource type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBinding {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub bind_type: BindType,
    /// Set when `bind_type` is [`BindType::Rule`].
    pub rule_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateResourceBinding {
    pub tenant_id: Uuid,
    pub node_id: Uuid,
    pub env_id: Option<Uuid>,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub bind_type: BindType,
    pub rule_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct BindingFilter {
    pub node_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub bind_type: Option<BindType>,
}
