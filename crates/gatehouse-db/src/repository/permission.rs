//! Permission table binding.

use chrono::{DateTime, Utc};
use gatehouse_core::models::permission::{CreatePermission, Permission, UpdatePermission};
use surrealdb_types::SurrealValue;

use super::store::{EntityKind, SurrealEntityStore, decode_id};
use crate::error::DbError;
use crate::transaction::Transaction;

#[derive(Debug, SurrealValue)]
pub struct PermissionRow {
    record_id: String,
    name: String,
    codename: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionKind;

impl EntityKind for PermissionKind {
    const TABLE: &'static str = "permission";
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["name", "codename"];
    const PROJECTION: &'static str =
        "meta::id(id) AS record_id, name, codename, created_at, updated_at";

    type Entity = Permission;
    type Create = CreatePermission;
    type Update = UpdatePermission;
    type Row = PermissionRow;

    fn into_entity(row: PermissionRow) -> Result<Permission, DbError> {
        Ok(Permission {
            id: decode_id(&row.record_id)?,
            name: row.name,
            codename: row.codename,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn create_assignments(
        &self,
        input: CreatePermission,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        Ok(vec![
            tx.assign("name", input.name),
            tx.assign("codename", input.codename),
        ])
    }

    fn update_assignments(
        &self,
        input: UpdatePermission,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        let mut sets = Vec::new();
        if let Some(name) = input.name {
            sets.push(tx.assign("name", name));
        }
        if let Some(codename) = input.codename {
            sets.push(tx.assign("codename", codename));
        }
        Ok(sets)
    }
}

pub type SurrealPermissionRepository<C> = SurrealEntityStore<PermissionKind, C>;
