//! Error types for the CMDB.
//!
//! Every layer converts its own errors into [`CmdbError`] so callers can
//! branch on [`ErrorKind`] (or the stable numeric [`CmdbError::code`])
//! instead of matching message strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmdbError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} {key}")]
    AlreadyExists { entity: String, key: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`CmdbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Invalid,
    SystemError,
}

impl CmdbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Validation { .. } => ErrorKind::Invalid,
            Self::Database(_) | Self::Internal(_) => ErrorKind::SystemError,
        }
    }

    /// Stable code for boundary layers, refined by entity where one is known.
    pub fn code(&self) -> u32 {
        let entity_offset = |entity: &str| match entity {
            "model" => 1,
            "instance" => 2,
            "instance_relation" | "model_relation_type" => 3,
            "attribute" => 4,
            "model_group" => 5,
            "attribute_group" => 6,
            "service_tree_node" => 7,
            "binding_rule" => 8,
            "resource_binding" => 9,
            _ => 0,
        };
        match self {
            Self::NotFound { entity, .. } => 404_000 + entity_offset(entity),
            Self::AlreadyExists { entity, .. } => 409_000 + entity_offset(entity),
            Self::Validation { .. } => 400_001,
            Self::Database(_) | Self::Internal(_) => 500_001,
        }
    }
}

pub type CmdbResult<T> = Result<T, CmdbError>;
