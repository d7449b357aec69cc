//! Gatehouse Core: shared domain types.
//!
//! - Domain models ([`models`]) for users, groups and permissions
//! - Entity identifiers ([`EntityId`])
//! - Request context ([`RequestContext`])
//! - Error taxonomy ([`GatehouseError`])
//! - Repository traits ([`repository`]) implemented by storage crates

pub mod context;
pub mod error;
pub mod id;
pub mod models;
pub mod repository;

pub use context::RequestContext;
pub use error::{GatehouseError, GatehouseResult};
pub use id::EntityId;
