//! One instance of every repository, built once and shared by clone.

use surrealdb::Connection;

use crate::connection::DbManager;
use crate::repository::{
    GroupKind, PermissionKind, SurrealEntityStore, SurrealGroupPermissions,
    SurrealGroupRepository, SurrealPermissionRepository, SurrealRelationship, SurrealUserGroups,
    SurrealUserPermissions, SurrealUserRepository, UserKind,
};

pub struct Services<C: Connection> {
    pub users: SurrealUserRepository<C>,
    pub groups: SurrealGroupRepository<C>,
    pub permissions: SurrealPermissionRepository<C>,
    pub user_permissions: SurrealUserPermissions<C>,
    pub user_groups: SurrealUserGroups<C>,
    pub group_permissions: SurrealGroupPermissions<C>,
}

impl<C: Connection> Clone for Services<C> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            groups: self.groups.clone(),
            permissions: self.permissions.clone(),
            user_permissions: self.user_permissions.clone(),
            user_groups: self.user_groups.clone(),
            group_permissions: self.group_permissions.clone(),
        }
    }
}

impl<C: Connection> Services<C> {
    pub fn new(manager: DbManager<C>, pepper: Option<String>) -> Self {
        let users = SurrealEntityStore::new(manager.clone(), UserKind::new(pepper));
        let groups = SurrealEntityStore::new(manager.clone(), GroupKind);
        let permissions = SurrealEntityStore::new(manager, PermissionKind);

        Self {
            user_permissions: SurrealRelationship::new(permissions.clone()),
            user_groups: SurrealRelationship::new(groups.clone()),
            group_permissions: SurrealRelationship::new(permissions.clone()),
            users,
            groups,
            permissions,
        }
    }
}
