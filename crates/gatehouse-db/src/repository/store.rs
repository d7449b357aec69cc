//! Generic SurrealDB entity store.
//!
//! Every kind (user, group, permission) shares the same CRUD and search
//! behaviour; an [`EntityKind`] supplies the table, the projection and
//! the explicit field mapping between records and rows.

use std::sync::Arc;

use chrono::Utc;
use gatehouse_core::error::GatehouseResult;
use gatehouse_core::repository::{EntityRepository, PaginatedResult, Pagination, SearchFilter};
use gatehouse_core::{EntityId, RequestContext};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;

use crate::connection::{DbManager, Statement};
use crate::error::DbError;
use crate::transaction::{Transaction, TransactionCoordinator, TxScope};

/// Binding between a domain entity and its table.
pub trait EntityKind: Send + Sync + 'static {
    /// Table name, e.g. `user`.
    const TABLE: &'static str;
    /// Fields a [`SearchFilter`] may name.
    const SEARCHABLE_FIELDS: &'static [&'static str];
    /// Select list producing [`EntityKind::Row`]; must alias the record
    /// key as `record_id` and include `created_at`.
    const PROJECTION: &'static str;

    type Entity: Send;
    type Create: Send;
    type Update: Send;
    type Row: SurrealValue + Send;

    fn into_entity(row: Self::Row) -> Result<Self::Entity, DbError>;

    /// `SET` assignments for a new record, timestamps excluded.
    fn create_assignments(
        &self,
        input: Self::Create,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError>;

    /// `SET` assignments for the fields present in a patch.
    fn update_assignments(
        &self,
        input: Self::Update,
        tx: &mut Transaction,
    ) -> Result<Vec<String>, DbError>;
}

/// Escaped table reference for `FROM` clauses (`group` is a keyword).
pub(crate) fn table_ref<K: EntityKind>() -> String {
    format!("`{}`", K::TABLE)
}

pub(crate) fn decode_id(text: &str) -> Result<EntityId, DbError> {
    EntityId::parse(text).map_err(|e| DbError::Decode(e.to_string()))
}

pub(crate) fn decode_ids(ids: Vec<String>) -> Result<Vec<EntityId>, DbError> {
    ids.iter().map(|id| decode_id(id)).collect()
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
pub(crate) struct KeyRow {
    pub(crate) record_id: String,
}

/// `WHERE` clause under construction for a read.
#[derive(Debug, Default, Clone)]
pub(crate) struct Condition {
    clauses: Vec<String>,
    params: Vec<(String, serde_json::Value)>,
}

impl Condition {
    /// OR-combined case-insensitive substring matches. Field names are
    /// checked against the kind's allow-list before they reach a query.
    pub(crate) fn search<K: EntityKind>(mut self, filter: &SearchFilter) -> Result<Self, DbError> {
        let mut matches = Vec::new();
        for (field, term) in filter.pairs() {
            if !K::SEARCHABLE_FIELDS.iter().any(|allowed| *allowed == field) {
                return Err(DbError::UnknownSearchField {
                    entity: K::TABLE.into(),
                    field: field.into(),
                });
            }
            let name = format!("s{}", matches.len());
            matches.push(format!(
                "string::contains(string::lowercase({field}), ${name})"
            ));
            self.params.push((name, term.to_lowercase().into()));
        }
        if !matches.is_empty() {
            self.clauses.push(format!("({})", matches.join(" OR ")));
        }
        Ok(self)
    }

    pub(crate) fn ids_in(mut self, ids: &[String]) -> Self {
        self.clauses.push("meta::id(id) IN $ids".into());
        self.params.push(("ids".into(), ids.to_vec().into()));
        self
    }

    /// Excludes `ids`; an empty list adds no clause at all.
    pub(crate) fn ids_not_in(mut self, ids: &[String]) -> Self {
        if ids.is_empty() {
            return self;
        }
        self.clauses.push("meta::id(id) NOT IN $excluded".into());
        self.params.push(("excluded".into(), ids.to_vec().into()));
        self
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// SurrealDB-backed [`EntityRepository`] for one [`EntityKind`].
pub struct SurrealEntityStore<K: EntityKind, C: Connection> {
    manager: DbManager<C>,
    coordinator: TransactionCoordinator<C>,
    kind: Arc<K>,
}

impl<K: EntityKind, C: Connection> Clone for SurrealEntityStore<K, C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            coordinator: self.coordinator.clone(),
            kind: Arc::clone(&self.kind),
        }
    }
}

impl<K: EntityKind, C: Connection> SurrealEntityStore<K, C> {
    pub fn new(manager: DbManager<C>, kind: K) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(manager.clone()),
            manager,
            kind: Arc::new(kind),
        }
    }

    pub(crate) fn manager(&self) -> &DbManager<C> {
        &self.manager
    }

    pub(crate) async fn count(
        &self,
        ctx: &RequestContext,
        operation: &str,
        condition: &Condition,
    ) -> Result<u64, DbError> {
        let sql = format!(
            "SELECT count() AS total FROM {}{} GROUP ALL",
            table_ref::<K>(),
            condition.where_clause()
        );
        let statement = Statement::new(sql).extend(condition.params.clone());
        let rows: Vec<CountRow> = self.manager.fetch(ctx, operation, statement).await?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    /// Matching entities in creation order; `window` restricts to one
    /// page. An empty window returns nothing without a round trip.
    pub(crate) async fn fetch(
        &self,
        ctx: &RequestContext,
        operation: &str,
        condition: &Condition,
        window: Option<Pagination>,
    ) -> Result<Vec<K::Entity>, DbError> {
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY created_at ASC, record_id ASC",
            K::PROJECTION,
            table_ref::<K>(),
            condition.where_clause()
        );
        let mut statement_params = condition.params.clone();

        if let Some(window) = window {
            let Some(offset) = window.offset().filter(|_| window.size > 0) else {
                return Ok(Vec::new());
            };
            sql.push_str(" LIMIT $limit START $offset");
            statement_params.push(("limit".into(), window.size.into()));
            statement_params.push(("offset".into(), offset.into()));
        }

        let statement = Statement::new(sql).extend(statement_params);
        let rows: Vec<K::Row> = self.manager.fetch(ctx, operation, statement).await?;
        rows.into_iter().map(K::into_entity).collect()
    }

    fn select_record(record: &str) -> String {
        format!(
            "SELECT {} FROM type::record('{}', {record})",
            K::PROJECTION,
            K::TABLE
        )
    }

    fn not_found(id: &str) -> DbError {
        DbError::NotFound {
            entity: K::TABLE.into(),
            id: id.into(),
        }
    }
}

impl<K: EntityKind, C: Connection> EntityRepository for SurrealEntityStore<K, C> {
    type Entity = K::Entity;
    type Create = K::Create;
    type Update = K::Update;

    async fn create(&self, ctx: &RequestContext, input: K::Create) -> GatehouseResult<K::Entity> {
        let id = EntityId::generate().to_string();
        let now = Utc::now();
        let operation = format!("{}.create", K::TABLE);

        let rows: Vec<K::Row> = self
            .coordinator
            .run(ctx, TxScope::new(&operation, K::TABLE).with_id(&id), |tx| {
                let mut sets = self.kind.create_assignments(input, tx)?;
                sets.push(tx.assign_datetime("created_at", Some(now)));
                sets.push(tx.assign_datetime("updated_at", Some(now)));
                let record = tx.param(id.as_str());
                tx.push(format!(
                    "CREATE type::record('{}', {record}) SET {} RETURN NONE",
                    K::TABLE,
                    sets.join(", ")
                ));
                Ok(tx.push(Self::select_record(&record)))
            })
            .await?;

        let row = rows.into_iter().next().ok_or_else(|| DbError::Write {
            entity: K::TABLE.into(),
            id: Some(id.clone()),
            reason: "created record was not returned".into(),
        })?;
        Ok(K::into_entity(row)?)
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> GatehouseResult<K::Entity> {
        let id = EntityId::parse(id)?.to_string();
        let operation = format!("{}.get", K::TABLE);

        let statement = Statement::new(Self::select_record("$id")).bind("id", id.as_str());
        let rows: Vec<K::Row> = self.manager.fetch(ctx, &operation, statement).await?;
        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(&id))?;
        Ok(K::into_entity(row)?)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        pagination: Pagination,
        filter: SearchFilter,
    ) -> GatehouseResult<PaginatedResult<K::Entity>> {
        let condition = Condition::default().search::<K>(&filter)?;
        let operation = format!("{}.list", K::TABLE);

        let total = self.count(ctx, &operation, &condition).await?;
        let items = self
            .fetch(ctx, &operation, &condition, Some(pagination))
            .await?;

        Ok(PaginatedResult {
            items,
            total,
            page: pagination.page,
            size: pagination.size,
        })
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        input: K::Update,
    ) -> GatehouseResult<K::Entity> {
        let id = EntityId::parse(id)?.to_string();
        let now = Utc::now();
        let operation = format!("{}.update", K::TABLE);

        let rows: Vec<K::Row> = self
            .coordinator
            .run(ctx, TxScope::new(&operation, K::TABLE).with_id(&id), |tx| {
                let mut sets = self.kind.update_assignments(input, tx)?;
                sets.push(tx.assign_datetime("updated_at", Some(now)));
                let record = tx.param(id.as_str());
                tx.push(format!(
                    "UPDATE type::record('{}', {record}) SET {} RETURN NONE",
                    K::TABLE,
                    sets.join(", ")
                ));
                Ok(tx.push(Self::select_record(&record)))
            })
            .await?;

        let row = rows.into_iter().next().ok_or_else(|| Self::not_found(&id))?;
        Ok(K::into_entity(row)?)
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> GatehouseResult<()> {
        let id = EntityId::parse(id)?.to_string();
        let operation = format!("{}.delete", K::TABLE);

        let found: Vec<KeyRow> = self
            .coordinator
            .run(ctx, TxScope::new(&operation, K::TABLE).with_id(&id), |tx| {
                let record = tx.param(id.as_str());
                let found = tx.push(format!(
                    "SELECT meta::id(id) AS record_id FROM type::record('{}', {record})",
                    K::TABLE
                ));
                tx.push(format!("DELETE type::record('{}', {record})", K::TABLE));
                Ok(found)
            })
            .await?;

        if !found.iter().any(|row| row.record_id == id) {
            return Err(Self::not_found(&id).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    #[derive(Debug, SurrealValue)]
    struct ProbeRow {
        record_id: String,
    }

    impl EntityKind for Probe {
        const TABLE: &'static str = "probe";
        const SEARCHABLE_FIELDS: &'static [&'static str] = &["name", "code"];
        const PROJECTION: &'static str = "meta::id(id) AS record_id, created_at";

        type Entity = String;
        type Create = ();
        type Update = ();
        type Row = ProbeRow;

        fn into_entity(row: ProbeRow) -> Result<String, DbError> {
            Ok(row.record_id)
        }

        fn create_assignments(&self, _: (), _: &mut Transaction) -> Result<Vec<String>, DbError> {
            Ok(Vec::new())
        }

        fn update_assignments(&self, _: (), _: &mut Transaction) -> Result<Vec<String>, DbError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn search_builds_lowercased_or_clause() {
        let filter = SearchFilter::new(["name", "code"], ["Alice", "XY"]);
        let condition = Condition::default().search::<Probe>(&filter).unwrap();
        assert_eq!(
            condition.where_clause(),
            " WHERE (string::contains(string::lowercase(name), $s0) \
             OR string::contains(string::lowercase(code), $s1))"
        );
        assert_eq!(condition.params[0].1, serde_json::json!("alice"));
        assert_eq!(condition.params[1].1, serde_json::json!("xy"));
    }

    #[test]
    fn unknown_search_field_is_rejected() {
        let filter = SearchFilter::new(["password_hash"], ["x"]);
        let err = Condition::default().search::<Probe>(&filter).unwrap_err();
        assert!(matches!(err, DbError::UnknownSearchField { ref field, .. } if field == "password_hash"));
    }

    #[test]
    fn empty_exclusion_adds_no_clause() {
        let condition = Condition::default().ids_not_in(&[]);
        assert_eq!(condition.where_clause(), "");

        let condition = Condition::default()
            .ids_in(&["a".to_string()])
            .ids_not_in(&["b".to_string()]);
        assert_eq!(
            condition.where_clause(),
            " WHERE meta::id(id) IN $ids AND meta::id(id) NOT IN $excluded"
        );
    }

    #[test]
    fn stored_ids_must_be_canonical() {
        assert!(decode_ids(vec!["67e55044-10b1-426f-9247-bb680e5fe0c8".into()]).is_ok());
        assert!(matches!(
            decode_ids(vec!["bogus".into()]),
            Err(DbError::Decode(_))
        ));
    }
}
