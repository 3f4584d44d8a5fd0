//! Fixtures shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vellum_core::{
    new_entity_id, EntityId, Filter, IndexDeclaration, Query, Record, RecordMeta, StorageError,
    VellumResult,
};

use tokio::sync::Notify;

use crate::collection::{Collection, SharedCollection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub body: String,
}

impl Record for Note {
    fn collection_name() -> &'static str {
        "Note"
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// A note with its id already assigned.
pub fn note(body: &str) -> Note {
    Note {
        meta: RecordMeta::with_id(new_entity_id()),
        body: body.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            meta: RecordMeta::with_id(new_entity_id()),
            name: name.to_string(),
        }
    }
}

impl Record for Tag {
    fn collection_name() -> &'static str {
        "Tag"
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn indexes() -> Vec<IndexDeclaration> {
        vec![IndexDeclaration::ascending("name").unique()]
    }
}

/// Collection whose every call fails, counting the calls it received.
#[derive(Debug, Default)]
pub struct FailingCollection {
    pub calls: AtomicUsize,
}

impl FailingCollection {
    fn fail<R>(&self) -> VellumResult<R> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::ConnectionFailed {
            target: "memory://failing".to_string(),
            reason: "injected".to_string(),
        }
        .into())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Record> Collection<T> for FailingCollection {
    async fn get(&self, _id: EntityId) -> VellumResult<Option<T>> {
        self.fail()
    }

    async fn get_many(&self, _ids: &[EntityId]) -> VellumResult<Vec<T>> {
        self.fail()
    }

    async fn add(&self, _record: T) -> VellumResult<T> {
        self.fail()
    }

    async fn add_many(&self, _records: Vec<T>) -> VellumResult<Vec<T>> {
        self.fail()
    }

    async fn update(&self, _record: T) -> VellumResult<bool> {
        self.fail()
    }

    async fn delete(&self, _id: EntityId) -> VellumResult<bool> {
        self.fail()
    }

    async fn count(&self, _filter: Option<Filter>) -> VellumResult<u64> {
        self.fail()
    }

    async fn any(&self, _filter: Option<Filter>) -> VellumResult<bool> {
        self.fail()
    }

    async fn first_or_default(&self, _filter: Option<Filter>) -> VellumResult<Option<T>> {
        self.fail()
    }

    async fn query(&self, _query: Query) -> VellumResult<Vec<T>> {
        self.fail()
    }

    async fn to_list(&self, _from_cache: bool) -> VellumResult<Vec<T>> {
        self.fail()
    }
}

/// Pauses every `get` after the inner read until `release` is notified.
/// `fetched` is notified once the inner read has completed.
pub struct GatedReads {
    inner: SharedCollection<Note>,
    pub fetched: Notify,
    pub release: Notify,
}

impl GatedReads {
    pub fn new(inner: SharedCollection<Note>) -> Self {
        Self {
            inner,
            fetched: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl Collection<Note> for GatedReads {
    async fn get(&self, id: EntityId) -> VellumResult<Option<Note>> {
        let record = self.inner.get(id).await?;
        self.fetched.notify_one();
        self.release.notified().await;
        Ok(record)
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<Note>> {
        self.inner.get_many(ids).await
    }

    async fn add(&self, record: Note) -> VellumResult<Note> {
        self.inner.add(record).await
    }

    async fn add_many(&self, records: Vec<Note>) -> VellumResult<Vec<Note>> {
        self.inner.add_many(records).await
    }

    async fn update(&self, record: Note) -> VellumResult<bool> {
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

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<Note>> {
        self.inner.first_or_default(filter).await
    }

    async fn query(&self, query: Query) -> VellumResult<Vec<Note>> {
        self.inner.query(query).await
    }

    async fn to_list(&self, from_cache: bool) -> VellumResult<Vec<Note>> {
        self.inner.to_list(from_cache).await
    }
}

/// A plain store-backed `Note` collection plus its store.
pub async fn store_notes() -> (crate::store::InMemoryDocumentStore, SharedCollection<Note>) {
    let store = crate::store::InMemoryDocumentStore::new();
    let cache = crate::cache::MemoryCache::new();
    let notes = crate::adapter::StoreCollection::<Note>::open(&store, "notes-Test", &cache)
        .await
        .unwrap();
    (store, std::sync::Arc::new(notes))
}
