//! The per-entity-type collection contract.
//!
//! The storage adapter and every decorator implement [`Collection`], so a
//! pipeline is a stack of `Arc<dyn Collection<T>>` values, each wrapping the
//! next.

use std::sync::Arc;

use async_trait::async_trait;
use vellum_core::{EntityId, Filter, Query, Record, VellumResult};

/// Shared handle to a collection pipeline.
pub type SharedCollection<T> = Arc<dyn Collection<T>>;

/// Typed CRUD and query surface over one record type.
#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    /// Fetch one record by id.
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>>;

    /// Fetch every record whose id is in `ids`. Unknown ids are skipped.
    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>>;

    /// Insert a record and return it as persisted.
    async fn add(&self, record: T) -> VellumResult<T>;

    /// Insert several records and return them as persisted.
    async fn add_many(&self, records: Vec<T>) -> VellumResult<Vec<T>>;

    /// Replace the stored record with the same id. Returns `false` when no
    /// such record exists.
    async fn update(&self, record: T) -> VellumResult<bool>;

    /// Delete a record by id. Returns `false` when no such record exists.
    async fn delete(&self, id: EntityId) -> VellumResult<bool>;

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64>;

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool>;

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>>;

    /// Run a composable query against the collection.
    async fn query(&self, query: Query) -> VellumResult<Vec<T>>;

    /// Every record. With `from_cache` a caching pipeline may answer from
    /// its cache instead of the store.
    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<T>>;
}
