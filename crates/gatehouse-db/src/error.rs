//! Database-specific error types and conversions.

use gatehouse_core::error::GatehouseError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A statement was rejected and the transaction was cancelled.
    #[error("Write to {entity} rejected: {reason}")]
    Write {
        entity: String,
        id: Option<String>,
        reason: String,
    },

    /// The commit round trip failed; the outcome is unknown.
    #[error("Commit on {entity} failed: {reason}")]
    Commit { entity: String, reason: String },

    #[error("Operation {operation} exceeded its deadline")]
    Timeout { operation: String },

    #[error("Connection pool closed")]
    PoolClosed,

    #[error("Unknown search field {field:?} for {entity}")]
    UnknownSearchField { entity: String, field: String },

    #[error("Malformed stored record: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl From<DbError> for GatehouseError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GatehouseError::NotFound { entity, id },
            DbError::Write { entity, id, reason } => {
                GatehouseError::WriteFailure { entity, id, reason }
            }
            DbError::Commit { entity, reason } => GatehouseError::CommitFailure { entity, reason },
            DbError::Timeout { operation } => GatehouseError::Timeout { operation },
            DbError::UnknownSearchField { .. } => GatehouseError::Validation {
                message: err.to_string(),
            },
            other => GatehouseError::Database(other.to_string()),
        }
    }
}
