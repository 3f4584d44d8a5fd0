//! Storage adapter: the innermost stage of every pipeline.
//!
//! [`StoreCollection`] maps [`Collection`] calls onto a [`DocumentCollection`]
//! and, when opened, makes sure the record type's declared indexes exist.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};
use vellum_core::{EntityId, Filter, Query, Record, VellumResult};

use crate::cache::{index_ready_key, CacheService, CacheServiceExt};
use crate::collection::Collection;
use crate::store::{Document, DocumentCollection, DocumentStore};

/// Collection backed directly by a document store.
pub struct StoreCollection<T: Record> {
    collection: Arc<dyn DocumentCollection>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> StoreCollection<T> {
    /// Open the collection named by `T` in `database`, provisioning its
    /// indexes if the shared cache does not already mark them ready.
    ///
    /// Connection failures are logged and returned.
    pub async fn open(
        store: &dyn DocumentStore,
        database: &str,
        cache: &dyn CacheService,
    ) -> VellumResult<Self> {
        let name = T::collection_name();

        let collection = match store.collection(database, name).await {
            Ok(collection) => collection,
            Err(e) => {
                error!(
                    severity = "critical",
                    collection = name,
                    location = %store.location(),
                    error = %e,
                    "Failed to open collection"
                );
                return Err(e);
            }
        };

        let ready_key = index_ready_key(name);
        if !cache.get::<bool>(&ready_key)?.unwrap_or(false) {
            match ensure_indexes::<T>(collection.as_ref()).await {
                Ok(true) => cache.set(&ready_key, &true, None)?,
                Ok(false) => debug!(collection = name, "Index provisioning deferred"),
                Err(e) => {
                    error!(
                        severity = "critical",
                        collection = name,
                        location = %store.location(),
                        error = %e,
                        "Index provisioning failed"
                    );
                    return Err(e);
                }
            }
        }

        Ok(Self {
            collection,
            _record: PhantomData,
        })
    }
}

/// Make sure `T`'s declared indexes exist. Returns whether the collection
/// can be considered ready.
///
/// A collection that has no documents yet is left alone: it has not been
/// materialized, and provisioning is retried on a later open.
async fn ensure_indexes<T: Record>(collection: &dyn DocumentCollection) -> VellumResult<bool> {
    let declared = T::indexes();
    if declared.is_empty() {
        return Ok(true);
    }

    let existing = match collection.list_indexes().await {
        Ok(indexes) => indexes,
        Err(e) => {
            debug!(collection = collection.name(), error = %e, "Could not list indexes");
            return Ok(false);
        }
    };

    if existing.iter().any(|index| !index.is_primary()) {
        return Ok(true);
    }

    if collection.estimated_document_count().await? == 0 {
        return Ok(false);
    }

    for index in &declared {
        let name = collection.create_index(index).await?;
        info!(collection = collection.name(), index = %name, "Created index");
    }
    Ok(true)
}

fn to_document<T: Record>(record: &T) -> VellumResult<Document> {
    Ok(serde_json::to_value(record)?)
}

fn from_document<T: Record>(doc: Document) -> VellumResult<T> {
    Ok(serde_json::from_value(doc)?)
}

fn from_documents<T: Record>(docs: Vec<Document>) -> VellumResult<Vec<T>> {
    docs.into_iter().map(from_document).collect()
}

#[async_trait]
impl<T: Record> Collection<T> for StoreCollection<T> {
    async fn get(&self, id: EntityId) -> VellumResult<Option<T>> {
        self.collection
            .find_one(Some(&Filter::id(id)))
            .await?
            .map(from_document)
            .transpose()
    }

    async fn get_many(&self, ids: &[EntityId]) -> VellumResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.collection.find(&Query::filtered(Filter::ids(ids))).await?;
        from_documents(docs)
    }

    async fn add(&self, record: T) -> VellumResult<T> {
        self.collection.insert_one(to_document(&record)?).await?;
        Ok(record)
    }

    async fn add_many(&self, records: Vec<T>) -> VellumResult<Vec<T>> {
        if records.is_empty() {
            return Ok(records);
        }
        let docs = records
            .iter()
            .map(to_document)
            .collect::<VellumResult<Vec<_>>>()?;
        self.collection.insert_many(docs, false).await?;
        Ok(records)
    }

    async fn update(&self, record: T) -> VellumResult<bool> {
        let previous = self
            .collection
            .find_one_and_replace(record.id(), to_document(&record)?)
            .await?;
        Ok(previous.is_some())
    }

    async fn delete(&self, id: EntityId) -> VellumResult<bool> {
        Ok(self.collection.find_one_and_delete(id).await?.is_some())
    }

    async fn count(&self, filter: Option<Filter>) -> VellumResult<u64> {
        self.collection.count(filter.as_ref()).await
    }

    async fn any(&self, filter: Option<Filter>) -> VellumResult<bool> {
        Ok(self.collection.count(filter.as_ref()).await? > 0)
    }

    async fn first_or_default(&self, filter: Option<Filter>) -> VellumResult<Option<T>> {
        self.collection
            .find_one(filter.as_ref())
            .await?
            .map(from_document)
            .transpose()
    }

    async fn query(&self, query: Query) -> VellumResult<Vec<T>> {
        from_documents(self.collection.find(&query).await?)
    }

    async fn to_list(&self, _from_cache: bool) -> VellumResult<Vec<T>> {
        from_documents(self.collection.find(&Query::all()).await?)
    }
}
