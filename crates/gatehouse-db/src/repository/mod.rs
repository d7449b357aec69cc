//! SurrealDB repository implementations.

mod group;
mod permission;
mod relationship;
mod store;
mod user;

pub use group::{GroupKind, GroupPermissions, SurrealGroupPermissions, SurrealGroupRepository};
pub use permission::{PermissionKind, SurrealPermissionRepository};
pub use relationship::{Link, SurrealRelationship};
pub use store::{EntityKind, SurrealEntityStore};
pub use user::{
    SurrealUserGroups, SurrealUserPermissions, SurrealUserRepository, UserGroups, UserKind,
    UserPermissions,
};
