//! Permission domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: EntityId,
    /// Human readable name (e.g., `Can edit articles`).
    pub name: String,
    /// Machine name checked by authorization code (e.g., `can_edit`).
    pub codename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub name: String,
    pub codename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    pub name: Option<String>,
    pub codename: Option<String>,
}
