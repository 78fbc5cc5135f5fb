//! Database error types.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A stored row failed to decode into its typed entity.
    #[error("failed to decode {entity} {id}: {source}")]
    Decode {
        entity: &'static str,
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl DatabaseError {
    pub(crate) fn decode_json(
        entity: &'static str,
        id: &str,
        source: serde_json::Error,
    ) -> Self {
        DatabaseError::Decode {
            entity,
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn decode(
        entity: &'static str,
        id: &str,
        source: ValidationError,
    ) -> Self {
        DatabaseError::Decode {
            entity,
            id: id.to_string(),
            source: Box::new(source),
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
