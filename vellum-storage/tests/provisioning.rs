//! Registry construction, lazy index provisioning and connection failures.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::json;
use uuid::Uuid;
use vellum_core::{
    BackendKind, BackendOptions, CollectionOptions, ConfigError, DocumentStoreOptions, Record,
    VellumError, VellumResult,
};
use vellum_storage::{
    index_ready_key, CacheService, DocumentCollection, DocumentStore, InMemoryDocumentStore,
    MemoryCache, PersistenceServices, IN_MEMORY_DATABASE,
};
use vellum_test_utils::assertions::{assert_config_error, assert_connection_failed};
use vellum_test_utils::fixtures::in_memory_services;
use vellum_test_utils::{Customer, SampleEntity};

/// The in-memory store presented as an external document database.
#[derive(Clone, Default)]
struct DocumentBackend(InMemoryDocumentStore);

#[async_trait]
impl DocumentStore for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn location(&self) -> String {
        "mongodb://test".to_string()
    }

    async fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> VellumResult<Arc<dyn DocumentCollection>> {
        self.0.collection(database, name).await
    }
}

fn customer_ready(services: &PersistenceServices) -> bool {
    services.cache().contains(&index_ready_key(Customer::collection_name()))
}

async fn seed_customer(store: &InMemoryDocumentStore, database: &str) {
    let raw = store.collection(database, "Customer").await.unwrap();
    raw.insert_one(json!({
        "_id": Uuid::now_v7().to_string(),
        "email": "seed@example.com",
        "name": "Seed",
        "is_deleted": false,
    }))
    .await
    .unwrap();
}

#[tokio::test]
async fn test_indexes_are_created_exactly_once() {
    let (services, store) = in_memory_services(CollectionOptions::in_memory()).unwrap();
    seed_customer(&store, IN_MEMORY_DATABASE).await;

    services
        .unit_of_work()
        .unwrap()
        .collection::<Customer>()
        .await
        .unwrap();
    services
        .unit_of_work()
        .unwrap()
        .collection::<Customer>()
        .await
        .unwrap();

    assert_eq!(store.index_creations(), Customer::indexes().len() as u64);
    assert!(customer_ready(&services));
}

#[tokio::test]
async fn test_existing_indexes_mark_ready_for_a_fresh_process() {
    let store = InMemoryDocumentStore::new();
    seed_customer(&store, IN_MEMORY_DATABASE).await;

    let first = PersistenceServices::from_parts(
        Arc::new(store.clone()),
        Arc::new(MemoryCache::new()),
        CollectionOptions::in_memory(),
    )
    .unwrap();
    first.unit_of_work().unwrap().collection::<Customer>().await.unwrap();
    assert_eq!(store.index_creations(), 2);

    // A second process has its own cache but sees the indexes already exist.
    let second = PersistenceServices::from_parts(
        Arc::new(store.clone()),
        Arc::new(MemoryCache::new()),
        CollectionOptions::in_memory(),
    )
    .unwrap();
    second.unit_of_work().unwrap().collection::<Customer>().await.unwrap();
    assert_eq!(store.index_creations(), 2);
    assert!(customer_ready(&second));
}

#[tokio::test]
async fn test_empty_collection_defers_provisioning() {
    let (services, store) = in_memory_services(CollectionOptions::in_memory()).unwrap();

    let uow = services.unit_of_work().unwrap();
    let customers = uow.collection::<Customer>().await.unwrap();
    assert_eq!(store.index_creations(), 0);
    assert!(!customer_ready(&services));

    // Materialized but empty: still deferred.
    let raw = store.collection(IN_MEMORY_DATABASE, "Customer").await.unwrap();
    let id = Uuid::now_v7();
    raw.insert_one(json!({ "_id": id.to_string(), "email": "tmp@example.com" }))
        .await
        .unwrap();
    raw.find_one_and_delete(id).await.unwrap();
    services
        .unit_of_work()
        .unwrap()
        .collection::<Customer>()
        .await
        .unwrap();
    assert!(!customer_ready(&services));
    assert_eq!(store.index_creations(), 0);

    customers
        .add(Customer::new("first@example.com", "First"))
        .await
        .unwrap();

    // The memoized pipeline does not re-run provisioning.
    uow.collection::<Customer>().await.unwrap();
    assert!(!customer_ready(&services));

    services
        .unit_of_work()
        .unwrap()
        .collection::<Customer>()
        .await
        .unwrap();
    assert!(customer_ready(&services));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_collection_is_memoized_and_built_once_under_concurrency() {
    let (services, store) = in_memory_services(CollectionOptions::in_memory()).unwrap();
    seed_customer(&store, IN_MEMORY_DATABASE).await;
    let uow = Arc::new(services.unit_of_work().unwrap());

    let handles = (0..8).map(|_| {
        let uow = uow.clone();
        tokio::spawn(async move { uow.collection::<Customer>().await })
    });
    let pipelines: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(pipelines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(store.index_creations(), 2);

    let again = uow.collection::<Customer>().await.unwrap();
    assert!(Arc::ptr_eq(&again, &pipelines[0]));
}

#[tokio::test]
async fn test_unreachable_store_fails_construction_then_recovers() {
    let (services, store) = in_memory_services(CollectionOptions::in_memory()).unwrap();
    let uow = services.unit_of_work().unwrap();

    store.set_available(false);
    let failed = uow.collection::<SampleEntity>().await.map(|_| ());
    assert_connection_failed(&failed);

    store.set_available(true);
    let samples = uow.collection::<SampleEntity>().await.unwrap();
    assert_eq!(samples.count(None).await.unwrap(), 0);
}

#[test]
fn test_backend_mismatch_is_a_config_error() {
    let result = PersistenceServices::from_parts(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(MemoryCache::new()),
        CollectionOptions::document("shop", "mongodb://localhost:27017"),
    )
    .map(|_| ());
    assert_config_error(&result);
}

#[test]
fn test_document_backend_requires_database_and_connection() {
    let result = PersistenceServices::document_store(
        "",
        "mongodb://localhost:27017",
        Vec::<String>::new(),
        Arc::new(DocumentBackend::default()),
    )
    .map(|_| ());
    assert_eq!(
        result,
        Err(VellumError::Config(ConfigError::MissingRequired {
            field: "database_name".to_string()
        }))
    );

    let result = PersistenceServices::document_store(
        "shop",
        "",
        Vec::<String>::new(),
        Arc::new(DocumentBackend::default()),
    )
    .map(|_| ());
    assert_config_error(&result);
}

#[tokio::test]
async fn test_document_backend_uses_environment_qualified_database() {
    let backend = DocumentBackend::default();
    let options = CollectionOptions {
        backend: BackendOptions::Document(
            DocumentStoreOptions::new("shop", "mongodb://localhost:27017")
                .with_environment("Staging"),
        ),
        ..CollectionOptions::default()
    };
    let services = PersistenceServices::from_parts(
        Arc::new(backend.clone()),
        Arc::new(MemoryCache::new()),
        options,
    )
    .unwrap();

    let uow = services.unit_of_work().unwrap();
    assert_eq!(uow.database_name(), "shop-Staging");

    let samples = uow.collection::<SampleEntity>().await.unwrap();
    samples.add(SampleEntity::new("staged")).await.unwrap();
    assert_eq!(backend.0.document_count("shop-Staging", "SampleEntity").await, 1);
    assert_eq!(backend.0.database_names(), vec!["shop-Staging".to_string()]);
}

#[tokio::test]
async fn test_never_evict_names_from_registration() {
    let backend = DocumentBackend::default();
    let services = PersistenceServices::document_store(
        "shop",
        "mongodb://localhost:27017",
        ["Country"],
        Arc::new(backend),
    )
    .unwrap();

    assert!(services.options().never_evict.contains("Country"));
    assert!(services
        .options()
        .is_never_evict::<vellum_test_utils::Country>());
}
