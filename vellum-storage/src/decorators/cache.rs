//! Write-through record cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use vellum_core::{EntityId, Filter, Query, Record, VellumResult};

use crate::cache::{CacheService, CacheServiceExt};
use crate::collection::{Collection, SharedCollection};

/// Caches records by id in the shared cache service.
///
/// Writes go to the inner collection first; the cache is only touched after
/// the inner call succeeds, so a failed write leaves the cache as it was.
/// Reads by id are served from the cache when possible and fill it on a
/// miss. A fill never replaces a live entry, so a read racing a successful
/// write cannot put the older value back. Filtered reads always go to the
/// inner collection.
///
/// Types configured as never-evict keep their entries until removed, and
/// `to_list(true)` is answered from the cache once it has been primed.
pub struct CacheDecorator<T: Record> {
    inner: SharedCollection<T>,
    cache: Arc<dyn CacheService>,
    scope: String,
    never_evict: bool,
    ttl: Duration,
}

impl<T: Record> CacheDecorator<T> {
    /// `scope` namespaces the keys, normally `{database}/{collection}`.
    pub fn new(
        inner: SharedCollection<T>,
        cache: Arc<dyn CacheService>,
        scope: impl Into<String>,
        never_evict: bool,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            scope: scope.into(),
            never_evict,
            ttl,
        }
    }

    fn key(&self, id: EntityId) -> String {
        format!("{}{}", self.entry_prefix(), id)
    }

    fn entry_prefix(&self) -> String {
        format!("{}:", self.scope)
    }

    fn primed_key(&self) -> String {
        format!("{}#primed", self.scope)
    }

    fn entry_ttl(&self) -> Option<Duration> {
        if self.never_evict {
            None
        } else {
            Some(self.ttl)
        }
    }

    fn remember(&self, record: &T) -> VellumResult<()> {
        self.cache.set(&self.key(record.id()), record, self.entry_ttl())
    }

    fn remember_all(&self, records: &[T]) -> VellumResult<()> {
        records.iter().try_for_each(|r| self.remember(r))
    }

    /// Read-path fill: keeps whatever a concurrent write already cached.
    fn fill(&self, record: &T) -> VellumResult<()> {
        self.cache
            .set_if_absent(&self.key(record.id()), record, self.entry_ttl())
            .map(|_| ())
    }

    fn fill_all(&self, records: &[T]) -> VellumResult<()> {
        records.iter().try_for_each(|r| self.fill(r))
    }

    fn cached(&self, id: EntityId) -> VellumResult<Option<T>> {
        self.cache.get::<T>(&self.key(id))
    }

    fn cached_all(&self) -> VellumResult<Vec<T>> {
        let mut records = self
            .cache
            .values_with_prefix(&self.entry_prefix())
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    /// Load everything from the inner collection into the cache.
    async fn prime(&self) -> VellumResult<Vec<T>> {
        let records = self.inner.to_list(false).await?;
        // The marker is written first so it never outlives the entries.
        self.cache.set(&self.primed_key(), &true, self.entry_ttl())?;
        self.fill_all(&records)?;
        Ok(records)
    }
}

#[async_trait]
impl<T: Record> Collection<T> for CacheDecorator<T> {
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>> {
        if let Some(record) = self.cached(id)? {
            trace!(collection = T::collection_name(), %id, "Cache hit");
            return Ok(Some(record));
        }

        let record = self.inner.get(id).await?;
        if let Some(record) = &record {
            self.fill(record)?;
        }
        Ok(record)
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>> {
        let mut found: HashMap<EntityId, T> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.cached(*id)? {
                Some(record) => {
                    found.insert(*id, record);
                }
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            let fetched = self.inner.get_many(&missing).await?;
            self.fill_all(&fetched)?;
            found.extend(fetched.into_iter().map(|r| (r.id(), r)));
        }

        // Request order, each id at most once.
        let mut records = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(record) = found.remove(id) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn add(&self, record: T) -> VellumResult<T> {
        let saved = self.inner.add(record).await?;
        self.remember(&saved)?;
        Ok(saved)
    }

    async fn add_many(&self, records: Vec<T>) -> VellumResult<Vec<T>> {
        let saved = self.inner.add_many(records).await?;
        self.remember_all(&saved)?;
        Ok(saved)
    }

    async fn update(&self, record: T) -> VellumResult<bool> {
        let candidate = record.clone();
        let updated = self.inner.update(record).await?;
        if updated {
            self.remember(&candidate)?;
        }
        Ok(updated)
    }

    async fn delete(&self, id: EntityId) -> VellumResult<bool> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.cache.remove(&self.key(id));
        }
        Ok(deleted)
    }

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64> {
        self.inner.count(filter).await
    }

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool> {
        self.inner.any(filter).await
    }

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>> {
        let record = self.inner.first_or_default(filter).await?;
        if let Some(record) = &record {
            self.fill(record)?;
        }
        Ok(record)
    }

    async fn query(&self, query: Query) -> VellumResult<Vec<T>> {
        self.inner.query(query).await
    }

    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<T>> {
        if !from_cache {
            let records = self.inner.to_list(false).await?;
            self.fill_all(&records)?;
            return Ok(records);
        }

        if self.cache.contains(&self.primed_key()) {
            trace!(collection = T::collection_name(), "Serving list from cache");
            return self.cached_all();
        }
        self.prime().await
    }
}
