//! Instance relation domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmdbError, CmdbResult};

/// A directed, typed edge between two instances of one tenant.
///
/// `(source_instance_id, target_instance_id, relation_type_uid)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRelation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source_instance_id: Uuid,
    pub target_instance_id: Uuid,
    pub relation_type_uid: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CreateInstanceRelation {
    pub tenant_id: Uuid,
    pub source_instance_id: Uuid,
    pub target_instance_id: Uuid,
    pub relation_type_uid: String,
}

impl CreateInstanceRelation {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.source_instance_id.is_nil() || self.target_instance_id.is_nil() {
            return Err(CmdbError::validation(
                "relation source and target instance are required",
            ));
        }
        if self.relation_type_uid.trim().is_empty() {
            return Err(CmdbError::validation("relation type uid cannot be empty"));
        }
        Ok(())
    }
}

/// Relation listing filter; unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct InstanceRelationFilter {
    pub tenant_id: Option<Uuid>,
    pub source_instance_id: Option<Uuid>,
    pub target_instance_id: Option<Uuid>,
    pub relation_type_uid: Option<String>,
}
