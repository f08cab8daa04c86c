//! Model (asset type) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CmdbError, CmdbResult};

/// Provider value that makes a model visible under every provider filter.
pub const PROVIDER_ALL: &str = "all";

/// Schema-level definition of an asset type, e.g. `cloud_vm`.
///
/// Models are global: every tenant shares the same catalog. The UID is the
/// natural key and is never reused after deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub uid: String,
    pub name: String,
    pub category: String,
    /// UID of the parent model, if this model specializes another.
    pub parent_uid: Option<String>,
    pub level: i64,
    pub provider: String,
    pub icon: String,
    pub description: String,
    /// Whether tenants may add custom attributes to this model.
    pub extensible: bool,
    /// UID of the [`ModelGroup`](super::model_group::ModelGroup) this model
    /// is filed under.
    pub model_group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateModel {
    pub uid: String,
    pub name: String,
    pub category: String,
    pub parent_uid: Option<String>,
    pub level: i64,
    pub provider: String,
    pub icon: String,
    pub description: String,
    pub extensible: bool,
    pub model_group: Option<String>,
}

impl CreateModel {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.uid.trim().is_empty() {
            return Err(CmdbError::validation("model uid cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CmdbError::validation("model name cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateModel {
    pub name: Option<String>,
    pub category: Option<String>,
    pub parent_uid: Option<Option<String>>,
    pub level: Option<i64>,
    pub provider: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub extensible: Option<bool>,
    pub model_group: Option<Option<String>>,
}

/// Filter for model listings. Empty fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub provider: Option<String>,
    pub category: Option<String>,
    pub parent_uid: Option<String>,
    pub model_group: Option<String>,
    pub extensible: Option<bool>,
}
