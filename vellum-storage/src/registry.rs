//! Collection registry: one memoized pipeline per record type.

use std::any::{Any, TypeId};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;
use vellum_core::{
    ActorId, BackendOptions, CollectionOptions, ConfigError, Record, StorageError, VellumError,
    VellumResult,
};

use crate::adapter::StoreCollection;
use crate::cache::CacheService;
use crate::collection::SharedCollection;
use crate::decorators::{
    CacheDecorator, FillDefaultsDecorator, SoftDeleteDecorator, TimingDecorator,
};
use crate::store::DocumentStore;

/// Database used when the options name none (in-memory backend).
pub const IN_MEMORY_DATABASE: &str = "vellum";

type ErasedPipeline = Arc<dyn Any + Send + Sync>;

/// Hands out one decorated collection per record type.
///
/// The first `collection::<T>()` call opens the storage adapter (provisioning
/// indexes if needed) and stacks the decorators; later calls return the same
/// instance. Concurrent first calls for one type wait on a single
/// construction. A failed construction is not memoized, so the next call
/// tries again.
pub struct UnitOfWork {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn CacheService>,
    options: Arc<CollectionOptions>,
    database: String,
    actor: RwLock<Option<ActorId>>,
    pipelines: DashMap<TypeId, Arc<OnceCell<ErasedPipeline>>>,
}

impl UnitOfWork {
    /// Create a registry after checking that `options` fit `store`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn CacheService>,
        options: Arc<CollectionOptions>,
    ) -> VellumResult<Self> {
        let database = database_name(&options, store.as_ref())?;
        Ok(Self {
            store,
            cache,
            options,
            database,
            actor: RwLock::new(None),
            pipelines: DashMap::new(),
        })
    }

    /// Set the acting user before any collection is requested.
    pub fn with_actor(mut self, actor: ActorId) -> Self {
        // Replacing the lock also discards any poisoning.
        self.actor = RwLock::new(Some(actor));
        self
    }

    /// Change the acting user. Pipelines already built keep the actor they
    /// were built with.
    pub fn set_actor(&self, actor: Option<ActorId>) -> VellumResult<()> {
        let mut slot = self
            .actor
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        *slot = actor;
        Ok(())
    }

    pub fn actor(&self) -> VellumResult<Option<ActorId>> {
        let slot = self.actor.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(*slot)
    }

    /// Fully qualified database name this registry works in.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    /// The decorated collection for `T`.
    pub async fn collection<T: Record>(&self) -> VellumResult<SharedCollection<T>> {
        let cell = self
            .pipelines
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let erased = cell
            .get_or_try_init(|| async move {
                let pipeline = self.build::<T>().await?;
                Ok::<ErasedPipeline, VellumError>(Arc::new(pipeline))
            })
            .await?;

        let any: &(dyn Any + Send + Sync) = erased.as_ref();
        any.downcast_ref::<SharedCollection<T>>()
            .cloned()
            .ok_or_else(|| {
                StorageError::PipelineTypeMismatch {
                    collection: T::collection_name().to_string(),
                }
                .into()
            })
    }

    async fn build<T: Record>(&self) -> VellumResult<SharedCollection<T>> {
        let actor = self.actor()?;
        build_pipeline::<T>(
            self.store.as_ref(),
            self.cache.clone(),
            &self.options,
            &self.database,
            actor,
        )
        .await
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("database", &self.database)
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

/// Assemble the decorator stack for `T`:
/// store → cache → defaults → soft delete → timing (when enabled).
pub async fn build_pipeline<T: Record>(
    store: &dyn DocumentStore,
    cache: Arc<dyn CacheService>,
    options: &CollectionOptions,
    database: &str,
    actor: Option<ActorId>,
) -> VellumResult<SharedCollection<T>> {
    let adapter = StoreCollection::<T>::open(store, database, cache.as_ref()).await?;

    let never_evict = options.is_never_evict::<T>();
    let scope = format!("{}/{}", database, T::collection_name());
    let cached: SharedCollection<T> = Arc::new(CacheDecorator::new(
        Arc::new(adapter),
        cache,
        scope,
        never_evict,
        options.cache_duration_for::<T>(),
    ));
    let defaults: SharedCollection<T> =
        Arc::new(FillDefaultsDecorator::new(cached, actor, options.audit_policy));
    let mut pipeline: SharedCollection<T> =
        Arc::new(SoftDeleteDecorator::new(defaults, options.include_deleted));
    if options.time_logging_enabled {
        pipeline = Arc::new(TimingDecorator::new(pipeline));
    }

    debug!(
        collection = T::collection_name(),
        database,
        never_evict,
        timed = options.time_logging_enabled,
        "Built collection pipeline"
    );
    Ok(pipeline)
}

/// Check that `options` describe the backend `store` is, and that a document
/// backend is fully configured.
pub(crate) fn check_options(
    options: &CollectionOptions,
    store: &dyn DocumentStore,
) -> Result<(), ConfigError> {
    if options.backend.kind() != store.kind() {
        return Err(ConfigError::BackendMismatch {
            expected: store.kind().to_string(),
            actual: options.backend.kind().to_string(),
        });
    }
    if let BackendOptions::Document(document) = &options.backend {
        document.validate()?;
    }
    Ok(())
}

fn database_name(options: &CollectionOptions, store: &dyn DocumentStore) -> VellumResult<String> {
    check_options(options, store)?;
    Ok(match &options.backend {
        BackendOptions::InMemory => IN_MEMORY_DATABASE.to_string(),
        BackendOptions::Document(document) => document.full_database_name(),
    })
}
