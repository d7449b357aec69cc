//! User table binding.
//!
//! Passwords are hashed with Argon2id before the write is staged; the
//! hash is stored in `password_hash` and never selected back.

use chrono::{DateTime, Utc};
use gatehouse_core::models::user::{CreateUser, UpdateUser, User};
use surrealdb_types::SurrealValue;

use super::group::GroupKind;
use super::permission::PermissionKind;
use super::relationship::{Link, SurrealRelationship};
use super::store::{EntityKind, SurrealEntityStore, decode_id, decode_ids};
use crate::error::DbError;
use crate::password::hash_password;
use crate::transaction::Transaction;

#[derive(Debug, SurrealValue)]
pub struct UserRow {
    record_id: String,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    is_superuser: bool,
    is_staff: bool,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    group_ids: Vec<String>,
    permission_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// User kind, carrying the optional server-side pepper.
#[derive(Debug, Clone, Default)]
pub struct UserKind {
    pepper: Option<String>,
}

impl UserKind {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }
}

impl EntityKind for UserKind {
    const TABLE: &'static str = "user";
    const SEARCHABLE_FIELDS: &'static [&'static str] =
        &["username", "email", "first_name", "last_name"];
    const PROJECTION: &'static str = "meta::id(id) AS record_id, username, email, \
        first_name, last_name, is_superuser, is_staff, is_active, last_login, \
        group_ids, permission_ids, created_at, updated_at";

    type Entity = User;
    type Create = CreateUser;
    type Update = UpdateUser;
    type Row = UserRow;

    fn into_entity(row: UserRow) -> Result<User, DbError> {
        Ok(User {
            id: decode_id(&row.record_id)?,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_superuser: row.is_superuser,
            is_staff: row.is_staff,
            is_active: row.is_active,
            last_login: row.last_login,
            group_ids: decode_ids(row.group_ids)?,
            permission_ids: decode_ids(row.permission_ids)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn create_assignments(
        &self,
        input: CreateUser,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;
        Ok(vec![
            tx.assign("username", input.username),
            tx.assign("email", input.email),
            tx.assign("password_hash", password_hash),
            tx.assign("first_name", input.first_name),
            tx.assign("last_name", input.last_name),
            tx.assign("is_superuser", input.is_superuser),
            tx.assign("is_staff", input.is_staff),
            tx.assign("is_active", input.is_active),
        ])
    }

    fn update_assignments(
        &self,
        input: UpdateUser,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError> {
        let mut sets = Vec::new();
        if let Some(password) = input.password {
            let password_hash = hash_password(&password, self.pepper.as_deref())?;
            sets.push(tx.assign("password_hash", password_hash));
        }
        if let Some(username) = input.username {
            sets.push(tx.assign("username", username));
        }
        if let Some(email) = input.email {
            sets.push(tx.assign("email", email));
        }
        if let Some(first_name) = input.first_name {
            sets.push(tx.assign("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            sets.push(tx.assign("last_name", last_name));
        }
        if let Some(is_superuser) = input.is_superuser {
            sets.push(tx.assign("is_superuser", is_superuser));
        }
        if let Some(is_staff) = input.is_staff {
            sets.push(tx.assign("is_staff", is_staff));
        }
        if let Some(is_active) = input.is_active {
            sets.push(tx.assign("is_active", is_active));
        }
        if let Some(last_login) = input.last_login {
            sets.push(tx.assign_datetime("last_login", last_login));
        }
        Ok(sets)
    }
}

/// User → Permission via `user.permission_ids`.
pub struct UserPermissions;

impl Link for UserPermissions {
    type Owner = UserKind;
    type Target = PermissionKind;
    const FIELD: &'static str = "permission_ids";
}

/// User → Group via `user.group_ids`.
pub struct UserGroups;

impl Link for UserGroups {
    type Owner = UserKind;
    type Target = GroupKind;
    const FIELD: &'static str = "group_ids";
}

pub type SurrealUserRepository<C> = SurrealEntityStore<UserKind, C>;
pub type SurrealUserPermissions<C> = SurrealRelationship<UserPermissions, C>;
pub type SurrealUserGroups<C> = SurrealRelationship<UserGroups, C>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_present_fields() {
        let mut tx = Transaction::default();
        let sets = UserKind::default()
            .update_assignments(
                UpdateUser {
                    email: Some(String::new()),
                    last_login: Some(None),
                    ..Default::default()
                },
                &mut tx,
            )
            .unwrap();
        assert_eq!(sets, vec!["email = $p0", "last_login = NONE"]);
    }

    #[test]
    fn create_never_stores_the_raw_password() {
        let mut tx = Transaction::default();
        let sets = UserKind::new(Some("pepper".into()))
            .create_assignments(
                CreateUser {
                    username: "alice".into(),
                    email: "alice@example.com".into(),
                    password: "hunter2".into(),
                    first_name: String::new(),
                    last_name: String::new(),
                    is_superuser: false,
                    is_staff: false,
                    is_active: true,
                },
                &mut tx,
            )
            .unwrap();
        assert_eq!(sets[2], "password_hash = $p2");
        assert!(!UserKind::PROJECTION.contains("password_hash"));
    }
}
