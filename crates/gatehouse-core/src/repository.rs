//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async and take identifiers as text;
//! implementations parse them with [`EntityId::parse`](crate::EntityId::parse)
//! before touching the store.

use std::collections::HashMap;

use crate::context::RequestContext;
use crate::error::GatehouseResult;
use crate::models::{
    group::{CreateGroup, Group, UpdateGroup},
    permission::{CreatePermission, Permission, UpdatePermission},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries: a zero-based page index and a
/// page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub size: u64,
}

impl Pagination {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    /// `page * size`, or `None` when the window lies beyond any
    /// addressable row.
    pub fn offset(&self) -> Option<u64> {
        self.page.checked_mul(self.size)
    }

    /// A window that can never contain rows (zero size or overflowing
    /// offset).
    pub fn is_empty_window(&self) -> bool {
        self.size == 0 || self.offset().is_none()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, size: 50 }
    }
}

/// A paginated result set. `total` counts the whole filtered set, not
/// the page.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
}

impl<T> PaginatedResult<T> {
    /// Number of pages needed to cover `total` at this page size.
    pub fn pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}

/// Case-insensitive substring search over named fields.
///
/// Term *i* pairs with field *i*; terms without a field are dropped.
/// Pairs are combined with OR. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pairs: Vec<(String, String)>,
}

impl SearchFilter {
    pub fn new<F, T>(
        fields: impl IntoIterator<Item = F>,
        terms: impl IntoIterator<Item = T>,
    ) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        let pairs = fields
            .into_iter()
            .zip(terms)
            .map(|(field, term)| (field.into(), term.into()))
            .collect();
        Self { pairs }
    }

    /// Keep only the `allowed` keys present in arbitrary caller input,
    /// in allow-list order.
    pub fn from_params(allowed: &[&str], params: &HashMap<String, String>) -> Self {
        let pairs = allowed
            .iter()
            .filter_map(|key| {
                params
                    .get(*key)
                    .map(|term| ((*key).to_string(), term.clone()))
            })
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(f, t)| (f.as_str(), t.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Entity store
// ---------------------------------------------------------------------------

/// CRUD and search over one entity collection.
pub trait EntityRepository: Send + Sync {
    type Entity: Send;
    type Create: Send;
    type Update: Send;

    fn create(
        &self,
        ctx: &RequestContext,
        input: Self::Create,
    ) -> impl Future<Output = GatehouseResult<Self::Entity>> + Send;

    fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> impl Future<Output = GatehouseResult<Self::Entity>> + Send;

    fn list(
        &self,
        ctx: &RequestContext,
        pagination: Pagination,
        filter: SearchFilter,
    ) -> impl Future<Output = GatehouseResult<PaginatedResult<Self::Entity>>> + Send;

    /// Overwrite the fields present in `input`; always refreshes
    /// `updated_at`.
    fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        input: Self::Update,
    ) -> impl Future<Output = GatehouseResult<Self::Entity>> + Send;

    /// Hard delete. `NotFound` if nothing was removed.
    fn delete(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> impl Future<Output = GatehouseResult<()>> + Send;
}

pub trait UserRepository:
    EntityRepository<Entity = User, Create = CreateUser, Update = UpdateUser>
{
}

impl<R> UserRepository for R where
    R: EntityRepository<Entity = User, Create = CreateUser, Update = UpdateUser>
{
}

pub trait GroupRepository:
    EntityRepository<Entity = Group, Create = CreateGroup, Update = UpdateGroup>
{
}

impl<R> GroupRepository for R where
    R: EntityRepository<Entity = Group, Create = CreateGroup, Update = UpdateGroup>
{
}

pub trait PermissionRepository:
    EntityRepository<Entity = Permission, Create = CreatePermission, Update = UpdatePermission>
{
}

impl<R> PermissionRepository for R where
    R: EntityRepository<Entity = Permission, Create = CreatePermission, Update = UpdatePermission>
{
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Many-to-many association from an owner entity to a set of targets.
///
/// Only the owner → target direction is queryable; there is no lookup of
/// the owners referencing a given target.
pub trait RelationshipRepository: Send + Sync {
    type Target: Send;

    /// Add `target_id` to the owner's set. Already present is success.
    fn attach(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        target_id: &str,
    ) -> impl Future<Output = GatehouseResult<()>> + Send;

    /// Remove `target_id` from the owner's set. Already absent is success.
    fn detach(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        target_id: &str,
    ) -> impl Future<Output = GatehouseResult<()>> + Send;

    /// One page of attached targets. `total` is the number of attached
    /// targets that still exist.
    fn list_attached(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
        pagination: Pagination,
    ) -> impl Future<Output = GatehouseResult<PaginatedResult<Self::Target>>> + Send;

    fn list_attached_all(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
    ) -> impl Future<Output = GatehouseResult<Vec<Self::Target>>> + Send;

    /// Every target not in the owner's set (the whole collection when the
    /// set is empty).
    fn list_unattached(
        &self,
        ctx: &RequestContext,
        owner_id: &str,
    ) -> impl Future<Output = GatehouseResult<Vec<Self::Target>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_page_times_size() {
        assert_eq!(Pagination::new(0, 10).offset(), Some(0));
        assert_eq!(Pagination::new(3, 10).offset(), Some(30));
        assert_eq!(Pagination::new(u64::MAX, 2).offset(), None);
    }

    #[test]
    fn zero_size_is_an_empty_window() {
        assert!(Pagination::new(0, 0).is_empty_window());
        assert!(Pagination::new(u64::MAX, 2).is_empty_window());
        assert!(!Pagination::new(1, 5).is_empty_window());
    }

    #[test]
    fn pages_rounds_up() {
        let result = PaginatedResult::<()> {
            items: vec![],
            total: 11,
            page: 0,
            size: 5,
        };
        assert_eq!(result.pages(), 3);

        let empty = PaginatedResult::<()> {
            items: vec![],
            total: 0,
            page: 0,
            size: 0,
        };
        assert_eq!(empty.pages(), 0);
    }

    #[test]
    fn excess_terms_are_dropped() {
        let filter = SearchFilter::new(["username"], ["ali", "extra", "more"]);
        let pairs: Vec<_> = filter.pairs().collect();
        assert_eq!(pairs, vec![("username", "ali")]);
    }

    #[test]
    fn terms_pair_with_fields_by_position() {
        let filter = SearchFilter::new(["username", "email"], ["ali", "example.com"]);
        let pairs: Vec<_> = filter.pairs().collect();
        assert_eq!(pairs, vec![("username", "ali"), ("email", "example.com")]);
    }

    #[test]
    fn from_params_keeps_allowed_keys_in_order() {
        let mut params = HashMap::new();
        params.insert("email".to_string(), "corp".to_string());
        params.insert("password".to_string(), "secret".to_string());
        params.insert("username".to_string(), "bob".to_string());

        let filter = SearchFilter::from_params(&["username", "first_name", "email"], &params);
        let pairs: Vec<_> = filter.pairs().collect();
        assert_eq!(pairs, vec![("username", "bob"), ("email", "corp")]);
    }

    #[test]
    fn empty_filter_is_empty() {
        assert!(SearchFilter::default().is_empty());
        assert!(SearchFilter::new(Vec::<String>::new(), ["x"]).is_empty());
    }
}
