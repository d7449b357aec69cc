//! Error types for the Gatehouse system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatehouseError {
    /// The identifier text is malformed. Raised before any store access.
    #[error("Invalid identifier: {value:?}")]
    InvalidIdentifier { value: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// The store rejected the write; nothing was applied.
    #[error("Write to {entity} failed{}: {reason}", fmt_id(.id))]
    WriteFailure {
        entity: String,
        id: Option<String>,
        reason: String,
    },

    /// The commit did not report back; the outcome is unknown.
    #[error("Commit of {entity} transaction failed, outcome unknown: {reason}")]
    CommitFailure { entity: String, reason: String },

    #[error("Operation {operation} exceeded its deadline")]
    Timeout { operation: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),
}

fn fmt_id(id: &Option<String>) -> String {
    id.as_deref()
        .map(|id| format!(" (id {id})"))
        .unwrap_or_default()
}

impl GatehouseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type GatehouseResult<T> = Result<T, GatehouseError>;
