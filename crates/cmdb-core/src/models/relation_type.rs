//! Model relation type domain model.
//!
//! A relation type declares which pair of models may be connected and how;
//! instance relations reference it by UID.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CmdbError, CmdbResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BelongsTo,
    Contains,
    #[serde(rename = "bindto")]
    BindTo,
    Connects,
    DependsOn,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::Contains => "contains",
            Self::BindTo => "bindto",
            Self::Connects => "connects",
            Self::DependsOn => "depends_on",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "belongs_to" => Ok(Self::BelongsTo),
            "contains" => Ok(Self::Contains),
            "bindto" => Ok(Self::BindTo),
            "connects" => Ok(Self::Connects),
            "depends_on" => Ok(Self::DependsOn),
            other => Err(CmdbError::validation(format!(
                "unknown relation type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationDirection {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToMany => "many_to_many",
        }
    }
}

impl FromStr for RelationDirection {
    type Err = CmdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_to_one" | "1:1" => Ok(Self::OneToOne),
            "one_to_many" | "1:N" | "1:n" => Ok(Self::OneToMany),
            "many_to_many" | "N:N" | "n:n" => Ok(Self::ManyToMany),
            other => Err(CmdbError::validation(format!(
                "unknown relation direction: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRelationType {
    /// Unique key, e.g. `ecs_belongs_to_vpc`.
    pub uid: String,
    pub name: String,
    pub source_model_uid: String,
    pub target_model_uid: String,
    pub relation_type: RelationKind,
    pub direction: RelationDirection,
    /// Label read from source to target, e.g. "binds".
    pub source_to_target: String,
    /// Label read from target to source, e.g. "bound by".
    pub target_to_source: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateModelRelationType {
    pub uid: String,
    pub name: String,
    pub source_model_uid: String,
    pub target_model_uid: String,
    pub relation_type: RelationKind,
    pub direction: RelationDirection,
    pub source_to_target: String,
    pub target_to_source: String,
    pub description: String,
}

impl CreateModelRelationType {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.uid.trim().is_empty() {
            return Err(CmdbError::validation("relation type uid cannot be empty"));
        }
        if self.source_model_uid.trim().is_empty() || self.target_model_uid.trim().is_empty() {
            return Err(CmdbError::validation(
                "source and target model uid cannot be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateModelRelationType {
    pub name: Option<String>,
    pub relation_type: Option<RelationKind>,
    pub direction: Option<RelationDirection>,
    pub source_to_target: Option<String>,
    pub target_to_source: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRelationTypeFilter {
    pub source_model_uid: Option<String>,
    pub target_model_uid: Option<String>,
    pub relation_type: Option<RelationKind>,
}
