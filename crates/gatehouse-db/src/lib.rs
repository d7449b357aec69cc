//! Gatehouse Database: SurrealDB persistence for users, groups and
//! permissions.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`], [`PoolConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The transaction coordinator ([`TransactionCoordinator`])
//! - Repository implementations for the `gatehouse-core` traits
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod observer;
mod password;
pub mod repository;
mod schema;
mod services;
mod transaction;

pub use connection::{DbConfig, DbManager, PoolConfig, Statement};
pub use error::DbError;
pub use observer::{CommandEvent, CommandObserver, TracingObserver};
pub use password::{hash_password, verify_password};
pub use schema::{latest_version, run_migrations};
pub use services::Services;
pub use transaction::{Transaction, TransactionCoordinator, TransactionState, TxScope};
