//! Registration surface: wires a store, the shared cache and options
//! together and hands out units of work.

use std::sync::Arc;

use vellum_core::{CollectionOptions, VellumResult};

use crate::cache::{CacheService, MemoryCache};
use crate::registry::{check_options, UnitOfWork};
use crate::store::{DocumentStore, InMemoryDocumentStore};

/// Process-wide persistence services.
///
/// Holds the single cache shared by every unit of work, so index-ready flags
/// and never-evict entries survive across units of work. Clone it freely.
#[derive(Clone)]
pub struct PersistenceServices {
    store: Arc<dyn DocumentStore>,
    cache: Arc<MemoryCache>,
    options: Arc<CollectionOptions>,
}

impl PersistenceServices {
    /// Services over an external document store.
    ///
    /// `types_to_cache` names the record types whose cached entries are never
    /// evicted.
    pub fn document_store<I, S>(
        database_name: impl Into<String>,
        connection_string: impl Into<String>,
        types_to_cache: I,
        client: Arc<dyn DocumentStore>,
    ) -> VellumResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = CollectionOptions::document(database_name, connection_string)
            .with_never_evict_names(types_to_cache);
        Self::from_parts(client, Arc::new(MemoryCache::new()), options)
    }

    /// Non-persistent services for tests and demos.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryDocumentStore::new()),
            cache: Arc::new(MemoryCache::new()),
            options: Arc::new(CollectionOptions::in_memory()),
        }
    }

    /// Services from explicit parts. Fails when the options do not fit the
    /// store.
    pub fn from_parts(
        store: Arc<dyn DocumentStore>,
        cache: Arc<MemoryCache>,
        options: CollectionOptions,
    ) -> VellumResult<Self> {
        check_options(&options, store.as_ref())?;
        Ok(Self {
            store,
            cache,
            options: Arc::new(options),
        })
    }

    /// Adjust the options, re-checking them against the store.
    pub fn configure(
        self,
        configure: impl FnOnce(CollectionOptions) -> CollectionOptions,
    ) -> VellumResult<Self> {
        let options = configure((*self.options).clone());
        Self::from_parts(self.store, self.cache, options)
    }

    /// A fresh unit of work sharing this process's store and cache.
    pub fn unit_of_work(&self) -> VellumResult<UnitOfWork> {
        let cache: Arc<dyn CacheService> = self.cache.clone();
        UnitOfWork::new(self.store.clone(), cache, self.options.clone())
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }
}

impl std::fmt::Debug for PersistenceServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceServices")
            .field("store", &self.store.location())
            .field("options", &self.options)
            .finish()
    }
}
