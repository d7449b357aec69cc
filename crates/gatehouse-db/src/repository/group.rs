//! Group table binding.

use chrono::{DateTime, Utc};
use gatehouse_core::models::group::{CreateGroup, Group, UpdateGroup};
use surrealdb_types::SurrealValue;

use super::permission::PermissionKind;
use super::relationship::{Link, SurrealRelationship};
use super::store::{EntityKind, SurrealEntityStore, decode_id, decode_ids};
use crate::error::DbError;
use crate::transaction::Transaction;

#[derive(Debug, SurrealValue)]
pub struct GroupRow {
    record_id: String,
    name: String,
    permission_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupKind;

impl EntityKind for GroupKind {
    const TABLE: &'static str = "group";
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["name"];
    const PROJECTION: &'static str =
        "meta::id(id) AS record_id, name, permission_ids, created_at, updated_at";

    type Entity = Group;
    type Create = CreateGroup;
    type Update = UpdateGroup;
    type Row = GroupRow;

    fn into_entity(row: GroupRow) -> Result<Group, DbError> {
        Ok(Group {
            id: decode_id(&row.record_id)?,
            name: row.name,
            permission_ids: decode_ids(row.permission_ids)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn create_assignments(
        &self,
        input: CreateGroup,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        Ok(vec![tx.assign("name", input.name)])
    }

    fn update_assignments(
        &self,
        input: UpdateGroup,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        Ok(input
            .name
            .map(|name| tx.assign("name", name))
            .into_iter()
            .collect())
    }
}

/// Group → Permission via `group.permission_ids`.
pub struct GroupPermissions;

impl Link for GroupPermissions {
    type Owner = GroupKind;
    type Target = PermissionKind;
    const FIELD: &'static str = "permission_ids";
}

pub type SurrealGroupRepository<C> = SurrealEntityStore<GroupKind, C>;
pub type SurrealGroupPermissions<C> = SurrealRelationship<GroupPermissions, C>;
