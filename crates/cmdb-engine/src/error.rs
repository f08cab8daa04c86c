//! Engine error types.

use cmdb_core::error::CmdbError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("service tree node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("builtin attribute group cannot be deleted: {0}")]
    BuiltinGroup(String),

    #[error("builtin model group cannot be deleted: {0}")]
    BuiltinModelGroup(String),

    #[error("model group {0} still contains models")]
    ModelGroupInUse(String),

    #[error("topology seed {instance_id} does not belong to tenant {tenant_id}")]
    ForeignSeed { tenant_id: Uuid, instance_id: Uuid },
}

impl From<EngineError> for CmdbError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ModelNotFound(uid) => CmdbError::not_found("model", uid),
            EngineError::NodeNotFound(id) => CmdbError::not_found("service_tree_node", id),
            EngineError::BuiltinGroup(_)
            | EngineError::BuiltinModelGroup(_)
            | EngineError::ModelGroupInUse(_) => CmdbError::validation(err.to_string()),
            EngineError::ForeignSeed { instance_id, .. } => {
                CmdbError::not_found("instance", instance_id)
            }
        }
    }
}
