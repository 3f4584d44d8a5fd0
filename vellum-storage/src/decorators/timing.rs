//! Per-operation timing.

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;
use vellum_core::{EntityId, Filter, Query, Record, VellumResult};

use crate::collection::{Collection, SharedCollection};

/// Logs how long each collection operation took. Results and errors pass
/// through unchanged.
pub struct TimingDecorator<T: Record> {
    inner: SharedCollection<T>,
}

impl<T: Record> TimingDecorator<T> {
    pub fn new(inner: SharedCollection<T>) -> Self {
        Self { inner }
    }

    async fn timed<R, F>(&self, operation: &'static str, call: F) -> R
    where
        F: Future<Output = R> + Send,
    {
        let started = Instant::now();
        let result = call.await;
        info!(
            entity_type = T::collection_name(),
            operation,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Collection operation finished"
        );
        result
    }
}

#[async_trait]
impl<T: Record> Collection<T> for TimingDecorator<T> {
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>> {
        self.timed("get", self.inner.get(id)).await
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>> {
        self.timed("get_many", self.inner.get_many(ids)).await
    }

    async fn add(&self, record: T) -> VellumResult<T> {
        self.timed("add", self.inner.add(record)).await
    }

    async fn add_many(&self, records: Vec<T>) -> VellumResult<Vec<T>> {
        self.timed("add_many", self.inner.add_many(records)).await
    }

    async fn update(&self, record: T) -> VellumResult<bool> {
        self.timed("update", self.inner.update(record)).await
    }

    async fn delete(&self, id: EntityId) -> VellumResult<bool> {
        self.timed("delete", self.inner.delete(id)).await
    }

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64> {
        self.timed("count", self.inner.count(filter)).await
    }

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool> {
        self.timed("any", self.inner.any(filter)).await
    }

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>> {
        self.timed("first_or_default", self.inner.first_or_default(filter))
            .await
    }

    async fn query(&self, query: Query) -> VellumResult<Vec<T>> {
        self.timed("query", self.inner.query(query)).await
    }

    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<T>> {
        self.timed("to_list", self.inner.to_list(from_cache)).await
    }
}
