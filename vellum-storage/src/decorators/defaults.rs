//! Audit-field population on writes.

use async_trait::async_trait;
use chrono::Utc;
use vellum_core::{
    actor_is_set, is_assigned, new_entity_id, ActorId, AuditPolicy, EntityId, Filter, Query,
    Record, Timestamp, VellumResult,
};

use crate::collection::{Collection, SharedCollection};

/// Fills identity and audit fields before records reach the inner
/// collection.
///
/// The acting user is captured when the decorator is built; later changes
/// to the unit of work's actor do not affect an existing pipeline.
pub struct FillDefaultsDecorator<T: Record> {
    inner: SharedCollection<T>,
    actor: Option<ActorId>,
    policy: AuditPolicy,
}

impl<T: Record> FillDefaultsDecorator<T> {
    pub fn new(inner: SharedCollection<T>, actor: Option<ActorId>, policy: AuditPolicy) -> Self {
        Self {
            inner,
            actor: actor.filter(|a| !a.is_nil()),
            policy,
        }
    }

    fn preserve(&self) -> bool {
        self.policy == AuditPolicy::PreserveExisting
    }

    fn fill_for_add(&self, record: &mut T, now: Timestamp) {
        let preserve = self.preserve();
        let meta = record.meta_mut();

        if !is_assigned(&meta.id) {
            meta.id = new_entity_id();
        }

        // A creator declared on the record wins over the unit of work's actor.
        let user = if actor_is_set(&meta.created_by) {
            meta.created_by
        } else {
            self.actor
        };
        if let Some(user) = user {
            if !(preserve && actor_is_set(&meta.created_by)) {
                meta.created_by = Some(user);
            }
            if !(preserve && actor_is_set(&meta.last_modified_by)) {
                meta.last_modified_by = Some(user);
            }
        }

        let created_at = match meta.created_at {
            Some(existing) if preserve => existing,
            _ => now,
        };
        // A new record was last modified when it was created.
        meta.created_at = Some(created_at);
        meta.last_modified_at = Some(created_at);
    }

    fn fill_for_update(&self, record: &mut T, now: Timestamp) {
        let preserve = self.preserve();
        let meta = record.meta_mut();

        if let Some(actor) = self.actor {
            if !(preserve && actor_is_set(&meta.last_modified_by)) {
                meta.last_modified_by = Some(actor);
            }
        }
        meta.last_modified_at = match meta.last_modified_at {
            Some(existing) if preserve => Some(existing),
            _ => Some(now),
        };
    }
}

#[async_trait]
impl<T: Record> Collection<T> for FillDefaultsDecorator<T> {
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>> {
        self.inner.get(id).await
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>> {
        self.inner.get_many(ids).await
    }

    async fn add(&self, mut record: T) -> VellumResult<T> {
        self.fill_for_add(&mut record, Utc::now());
        self.inner.add(record).await
    }

    async fn add_many(&self, mut records: Vec<T>) -> VellumResult<Vec<T>> {
        let now = Utc::now();
        for record in &mut records {
            self.fill_for_add(record, now);
        }
        self.inner.add_many(records).await
    }

    async fn update(&self, mut record: T) -> VellumResult<bool> {
        self.fill_for_update(&mut record, Utc::now());
        self.inner.update(record).await
    }

    async fn delete(&self, id: EntityId) -> VellumResult<bool> {
        self.inner.delete(id).await
    }

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64> {
        self.inner.count(filter).await
    }

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool> {
        self.inner.any(filter).await
    }

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>> {
        self.inner.first_or_default(filter).await
    }

    async fn query(&self, query: Query) -> VellumResult<Vec<T>> {
        self.inner.query(query).await
    }

    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<T>> {
        self.inner.to_list(from_cache).await
    }
}
