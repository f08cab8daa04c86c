//! Model group domain model: the catalog sections models are filed under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Model;
use crate::error::{CmdbError, CmdbResult};

pub const MODEL_GROUP_HOST: &str = "host";
pub const MODEL_GROUP_CLOUD: &str = "cloud";
pub const MODEL_GROUP_NETWORK: &str = "network";
pub const MODEL_GROUP_DATABASE: &str = "database";
pub const MODEL_GROUP_MIDDLEWARE: &str = "middleware";
pub const MODEL_GROUP_CONTAINER: &str = "container";
pub const MODEL_GROUP_STORAGE: &str = "storage";
pub const MODEL_GROUP_SECURITY: &str = "security";
pub const MODEL_GROUP_IAM: &str = "iam";
pub const MODEL_GROUP_CUSTOM: &str = "custom";

/// UID of the synthetic bucket holding models without a known group.
/// Never stored.
pub const MODEL_GROUP_UNGROUPED: &str = "ungrouped";

/// Global classification of models, keyed by UID. A model points at its
/// group through [`Model::model_group`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGroup {
    pub uid: String,
    pub name: String,
    pub icon: String,
    pub sort_order: i64,
    /// Builtin groups cannot be deleted and keep their sort order.
    pub is_builtin: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelGroup {
    pub(crate) fn ungrouped() -> Self {
        let now = Utc::now();
        Self {
            uid: MODEL_GROUP_UNGROUPED.into(),
            name: "Ungrouped".into(),
            icon: "folder".into(),
            sort_order: 999,
            is_builtin: false,
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateModelGroup {
    pub uid: String,
    pub name: String,
    pub icon: String,
    pub sort_order: i64,
    pub is_builtin: bool,
    pub description: String,
}

impl CreateModelGroup {
    pub fn validate(&self) -> CmdbResult<()> {
        if self.uid.trim().is_empty() {
            return Err(CmdbError::validation("model group uid cannot be empty"));
        }
        if self.uid == MODEL_GROUP_UNGROUPED {
            return Err(CmdbError::validation(format!(
                "model group uid '{MODEL_GROUP_UNGROUPED}' is reserved"
            )));
        }
        if self.name.trim().is_empty() {
            return Err(CmdbError::validation("model group name cannot be empty"));
        }
        Ok(())
    }

    /// The catalog sections every deployment starts with.
    pub fn builtin() -> Vec<Self> {
        [
            (MODEL_GROUP_HOST, "Hosts", "server", 1),
            (MODEL_GROUP_CLOUD, "Cloud resources", "cloud", 2),
            (MODEL_GROUP_NETWORK, "Network devices", "network", 3),
            (MODEL_GROUP_DATABASE, "Databases", "database", 4),
            (MODEL_GROUP_MIDDLEWARE, "Middleware", "middleware", 5),
            (MODEL_GROUP_CONTAINER, "Containers", "container", 6),
            (MODEL_GROUP_STORAGE, "Storage", "storage", 7),
            (MODEL_GROUP_SECURITY, "Security", "security", 8),
            (MODEL_GROUP_IAM, "Identity and access", "user", 9),
            (MODEL_GROUP_CUSTOM, "Custom", "custom", 100),
        ]
        .into_iter()
        .map(|(uid, name, icon, sort_order)| Self {
            uid: uid.into(),
            name: name.into(),
            icon: icon.into(),
            sort_order,
            is_builtin: true,
            description: String::new(),
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateModelGroup {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i64>,
    pub description: Option<String>,
}

/// A model group together with the models filed under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelGroupWithModels {
    #[serde(flatten)]
    pub group: ModelGroup,
    pub models: Vec<Model>,
}

impl ModelGroupWithModels {
    /// Bucket for models whose group is unset or unknown.
    pub fn ungrouped(models: Vec<Model>) -> Self {
        Self {
            group: ModelGroup::ungrouped(),
            models,
        }
    }
}
