//! Soft delete: deletion sets a flag, reads hide flagged records.

use async_trait::async_trait;
use tracing::debug;
use vellum_core::filter::and_optional;
use vellum_core::{EntityId, Filter, Query, Record, VellumResult};

use crate::collection::{Collection, SharedCollection};

/// Turns `delete` into an update of the `is_deleted` flag and scopes reads
/// to records that are not flagged.
///
/// With `include_deleted` set, reads see flagged records too; deletes still
/// only flag.
pub struct SoftDeleteDecorator<T: Record> {
    inner: SharedCollection<T>,
    include_deleted: bool,
}

impl<T: Record> SoftDeleteDecorator<T> {
    pub fn new(inner: SharedCollection<T>, include_deleted: bool) -> Self {
        Self {
            inner,
            include_deleted,
        }
    }

    fn visible(&self, record: &T) -> bool {
        self.include_deleted || !record.is_deleted()
    }

    fn scope(&self, filter: Option<Filter>) -> Option<Filter> {
        if self.include_deleted {
            filter
        } else {
            Some(and_optional(filter, Filter::not_deleted()))
        }
    }

    fn retain_visible(&self, mut records: Vec<T>) -> Vec<T> {
        records.retain(|r| self.visible(r));
        records
    }
}

#[async_trait]
impl<T: Record> Collection<T> for SoftDeleteDecorator<T> {
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>> {
        Ok(self.inner.get(id).await?.filter(|r| self.visible(r)))
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>> {
        let records = self.inner.get_many(ids).await?;
        Ok(self.retain_visible(records))
    }

    async fn add(&self, record: T) -> VellumResult<T> {
        self.inner.add(record).await
    }

    async fn add_many(&self, records: Vec<T>) -> VellumResult<Vec<T>> {
        self.inner.add_many(records).await
    }

    async fn update(&self, record: T) -> VellumResult<bool> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: EntityId) -> VellumResult<bool> {
        let Some(mut record) = self.inner.get(id).await? else {
            return Ok(false);
        };
        if !self.visible(&record) {
            return Ok(false);
        }

        record.meta_mut().is_deleted = true;
        let flagged = self.inner.update(record).await?;
        debug!(collection = T::collection_name(), %id, flagged, "Soft delete");
        Ok(flagged)
    }

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64> {
        self.inner.count(self.scope(filter)).await
    }

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool> {
        self.inner.any(self.scope(filter)).await
    }

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>> {
        self.inner.first_or_default(self.scope(filter)).await
    }

    async fn query(&self, mut query: Query) -> VellumResult<Vec<T>> {
        query.filter = self.scope(query.filter.take());
        self.inner.query(query).await
    }

    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<T>> {
        let records = self.inner.to_list(from_cache).await?;
        Ok(self.retain_visible(records))
    }
}
