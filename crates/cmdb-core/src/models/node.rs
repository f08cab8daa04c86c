//! Service tree node domain model.
//!
//! Nodes form the organizational tree (business line / product / module /
//! cluster) that resources are bound to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmdbError, CmdbResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTreeNode {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Dotted path-like identifier, e.g. `biz.ecommerce.order`.
    pub uid: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub level: i64,
    pub owner: String,
    pub team: String,
    pub description: String,
    pub order: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateServiceTreeNode {
    pub tenant_id: Uuid,
    pub uid: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub level: i64,
    pub owner: String,
    pub team: String,
    pub description: String,
    pub order: i64,
}

impl CreateServiceTreeNode {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.name.trim().is_empty() {
            return Err(CmdbError::validation("node name cannot be empty"));
        }
        if self.tenant_id.is_nil() {
            return Err(CmdbError::validation("node tenant id cannot be empty"));
        }
        Ok(())
    }
}
