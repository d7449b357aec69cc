//! Many-to-many associations stored as an id set on the owner record.
//!
//! The owner's `array<string>` field holds target ids. Attach and detach
//! are set operations guarded so that a no-op leaves the owner (and its
//! `updated_at`) untouched. Ids of deleted targets may linger in the set;
//! listings only return targets that still exist.

use std::marker::PhantomData;

use chrono::Utc;
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::repository::{PaginatedResult, Pagination, RelationshipRepository};
use gatehouse_core::{EntityId, RequestContext};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;

use super::store::{Condition, EntityKind, KeyRow, SurrealEntityStore};
use crate::connection::Statement;
use crate::error::DbError;
use crate::transaction::{TransactionCoordinator, TxScope};

/// One owner field linking two kinds.
pub trait Link: Send + Sync + 'static {
    type Owner: EntityKind;
    type Target: EntityKind;
    /// Id-set field on the owner table.
    const FIELD: &'static str;
}

#[derive(Debug, SurrealValue)]
struct IdSetRow {
    ids: Vec<String>,
}

/// SurrealDB-backed [`RelationshipRepository`] for a [`Link`].
pub struct SurrealRelationship<L: Link, C: Connection> {
    coordinator: TransactionCoordinator<C>,
    targets: SurrealEntityStore<L::Target, C>,
    _link: PhantomData<L>,
}

impl<L: Link, C: Connection> Clone for SurrealRelationship<L, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            targets: self.targets.clone(),
            _link: PhantomData,
        }
    }
}

impl<L: Link, C: Connection> SurrealRelationship<L, C> {
    /// `targets` is the store listings are resolved against.
    pub fn new(targets: SurrealEntityStore<L::Target, C>) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(targets.manager().clone()),
            targets,
            _link: PhantomData,
        }
    }

    fn operation(action: &str) -> String {
        format!("{}.{}.{action}", <L::Owner as EntityKind>::TABLE, L::FIELD)
    }

    /// Stage one guarded update of the owner's set.
    async fn modify(
        &self,
        ctx: &RequestContext,
        action: &str,
        owner_id: &str,
        target_id: &str,
        expression: fn(field: &str, target: &str) -> String,
        guard: &str,
    ) -> GatehouseResult<()> {
        let owner = EntityId::parse(owner_id)?.to_string();
        let target = EntityId::parse(target_id)?.to_string();
        let now = Utc::now();
        let operation = Self::operation(action);

        let _: Vec<KeyRow> = self
            .coordinator
            .run(
                ctx,
                TxScope::new(&operation, <L::Owner as EntityKind>::TABLE).with_id(&owner),
                |tx| {
                    let record = tx.param(owner.as_str());
                    let target = tx.param(target.as_str());
                    let touched = tx.assign_datetime("updated_at", Some(now));
                    Ok(tx.push(format!(
                        "UPDATE type::record('{table}', {record}) \
                         SET {field} = {value}, {touched} \
                         WHERE {field} {guard} {target} RETURN NONE",
                        table = <L::Owner as EntityKind>::TABLE,
                        field = L::FIELD,
                        value = expression(L::FIELD, &target),
                    )))
                },
            )
            .await?;

        Ok(())
    }

    /// The owner's id set; `NotFound` when the owner does not exist.
    async fn owned_ids(
        &self,
        ctx: &RequestContext,
        operation: &str,
        owner_id: &str,
    ) -> Result<Vec<String>, DbError> {
        let statement = Statement::new(format!(
            "SELECT {} AS ids FROM type::record('{}', $owner)",
            L::FIELD,
            <L::Owner as EntityKind>::TABLE
        ))
        .bind("owner", owner_id);

        let rows: Vec<IdSetRow> = self
            .targets
            .manager()
            .fetch(ctx, operation, statement)
            .await?;
        rows.into_iter()
            .next()
            .map(|row| row.ids)
            .ok_or_else(|| DbError::NotFound {
                entity: <L::Owner as EntityKind>::TABLE.into(),
                id: owner_id.into(),
            })
    }
}

impl<L: Link, C: Connection> RelationshipRepository for SurrealRelationship<L, C> {
    type Target = <L::Target as EntityKind>::Entity;

    async fn attach(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        target_id: &str,
    ) -> GatehouseResult<()> {
        self.modify(
            ctx,
            "attach",
            owner_id,
            target_id,
            |field, target| format!("array::union({field}, [{target}])"),
            "CONTAINSNOT",
        )
        .await
    }

    async fn detach(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        target_id: &str,
    ) -> GatehouseResult<()> {
        self.modify(
            ctx,
            "detach",
            owner_id,
            target_id,
            |field, target| format!("array::complement({field}, [{target}])"),
            "CONTAINS",
        )
        .await
    }

    async fn list_attached(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        pagination: Pagination,
    ) -> GatehouseResult<PaginatedResult<Self::Target>> {
        let owner = EntityId::parse(owner_id)?.to_string();
        let operation = Self::operation("list");

        let ids = self.owned_ids(ctx, &operation, &owner).await?;
        if ids.is_empty() {
            return Ok(PaginatedResult {
                items: Vec::new(),
                total: 0,
                page: pagination.page,
                size: pagination.size,
            });
        }

        let condition = Condition::default().ids_in(&ids);
        let total = self.targets.count(ctx, &operation, &condition).await?;
        let items = self
            .targets
            .fetch(ctx, &operation, &condition, Some(pagination))
            .await?;

        Ok(PaginatedResult {
            items,
            total,
            page: pagination.page,
            size: pagination.size,
        })
    }

    async fn list_attached_all(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
    ) -> GatehouseResult<Vec<Self::Target>> {
        let owner = EntityId::parse(owner_id)?.to_string();
        let operation = Self::operation("list_all");

        let ids = self.owned_ids(ctx, &operation, &owner).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let condition = Condition::default().ids_in(&ids);
        Ok(self.targets.fetch(ctx, &operation, &condition, None).await?)
    }

    async fn list_unattached(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
    ) -> GatehouseResult<Vec<Self::Target>> {
        let owner = EntityId::parse(owner_id)?.to_string();
        let operation = Self::operation("list_unattached");

        let ids = self.owned_ids(ctx, &operation, &owner).await?;
        let condition = Condition::default().ids_not_in(&ids);
        Ok(self.targets.fetch(ctx, &operation, &condition, None).await?)
    }
}
