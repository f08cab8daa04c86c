//! Database-specific error types and conversions.

use cmdb_core::error::CmdbError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored value: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated: {entity} {key}")]
    Duplicate { entity: String, key: String },
}

impl DbError {
    /// Classify a failed statement, surfacing unique index violations as
    /// [`DbError::Duplicate`].
    pub(crate) fn from_statement(err: impl ToString, entity: &str, key: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            Self::Duplicate {
                entity: entity.into(),
                key: key.into(),
            }
        } else {
            Self::Query(message)
        }
    }
}

impl From<DbError> for CmdbError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CmdbError::NotFound { entity, id },
            DbError::Duplicate { entity, key } => CmdbError::AlreadyExists { entity, key },
            other => CmdbError::Database(other.to_string()),
        }
    }
}
