//! In-process document store.
//!
//! Behaves like a small document database: collections materialize on first
//! write or index creation, unique indexes are enforced on insert and
//! replace, and the whole store can be marked unavailable to exercise
//! connection failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;
use vellum_core::filter::lookup;
use vellum_core::{
    fields, BackendKind, EntityId, Filter, IndexDeclaration, Query, StorageError, VellumResult,
};

use super::{Document, DocumentCollection, DocumentStore, IndexInfo};

const LOCATION: &str = "memory://";

static NULL: Value = Value::Null;

#[derive(Debug)]
struct StoreHealth {
    available: AtomicBool,
    index_creations: AtomicU64,
}

impl StoreHealth {
    fn check(&self, database: &str) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::ConnectionFailed {
                target: format!("{}{}", LOCATION, database),
                reason: "store unavailable".to_string(),
            })
        }
    }
}

/// Document store held entirely in process memory.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<DashMap<(String, String), Arc<MemoryCollection>>>,
    health: Arc<StoreHealth>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(DashMap::new()),
            health: Arc::new(StoreHealth {
                available: AtomicBool::new(true),
                index_creations: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.health.available.store(available, Ordering::SeqCst);
    }

    /// Number of index-creation commands that actually created an index.
    pub fn index_creations(&self) -> u64 {
        self.health.index_creations.load(Ordering::SeqCst)
    }

    /// Number of stored documents in a collection, bypassing every decorator.
    pub async fn document_count(&self, database: &str, name: &str) -> usize {
        match self.existing(database, name) {
            Some(collection) => collection.state.read().await.docs.len(),
            None => 0,
        }
    }

    /// Raw stored document, bypassing every decorator.
    pub async fn raw_document(&self, database: &str, name: &str, id: EntityId) -> Option<Document> {
        let collection = self.existing(database, name)?;
        let state = collection.state.read().await;
        state.docs.get(&id).cloned()
    }

    /// Names of the databases that have at least one collection handle.
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().0.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn existing(&self, database: &str, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections
            .get(&(database.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    fn location(&self) -> String {
        LOCATION.to_string()
    }

    async fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> VellumResult<Arc<dyn DocumentCollection>> {
        self.health.check(database)?;

        let collection = self
            .collections
            .entry((database.to_string(), name.to_string()))
            .or_insert_with(|| {
                Arc::new(MemoryCollection {
                    database: database.to_string(),
                    name: name.to_string(),
                    health: self.health.clone(),
                    state: RwLock::new(CollectionState::default()),
                })
            })
            .value()
            .clone();

        Ok(collection)
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    materialized: bool,
    docs: BTreeMap<EntityId, Document>,
    indexes: Vec<IndexDeclaration>,
}

impl CollectionState {
    /// First unique index `doc` would violate, ignoring the document `skip`.
    fn violated_index(&self, doc: &Document, skip: Option<EntityId>) -> Option<String> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let Some(value) = indexed_value(doc, index) else {
                continue;
            };
            let clash = self
                .docs
                .iter()
                .filter(|(id, _)| Some(**id) != skip)
                .any(|(_, other)| indexed_value(other, index) == Some(value));
            if clash {
                return Some(index.name());
            }
        }
        None
    }

    fn insert(&mut self, collection: &str, doc: Document) -> Result<(), StorageError> {
        let id = document_id(collection, &doc)?;
        if self.docs.contains_key(&id) {
            return Err(StorageError::DuplicateKey {
                collection: collection.to_string(),
                index: IndexInfo::ID_INDEX.to_string(),
            });
        }
        if let Some(index) = self.violated_index(&doc, None) {
            return Err(StorageError::DuplicateKey {
                collection: collection.to_string(),
                index,
            });
        }
        self.materialized = true;
        self.docs.insert(id, doc);
        Ok(())
    }
}

/// Value a document contributes to `index`; `None` when a sparse index
/// skips the document.
fn indexed_value<'a>(doc: &'a Document, index: &IndexDeclaration) -> Option<&'a Value> {
    match lookup(doc, &index.field) {
        Some(Value::Null) | None if index.sparse => None,
        Some(value) => Some(value),
        None => Some(&NULL),
    }
}

fn document_id(collection: &str, doc: &Document) -> Result<EntityId, StorageError> {
    doc.get(fields::ID)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| StorageError::InsertFailed {
            collection: collection.to_string(),
            reason: "document has no valid _id".to_string(),
        })
}

#[derive(Debug)]
struct MemoryCollection {
    database: String,
    name: String,
    health: Arc<StoreHealth>,
    state: RwLock<CollectionState>,
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &Query) -> VellumResult<Vec<Document>> {
        self.health.check(&self.database)?;
        let state = self.state.read().await;
        Ok(query.apply(state.docs.values()))
    }

    async fn insert_one(&self, doc: Document) -> VellumResult<()> {
        self.health.check(&self.database)?;
        let mut state = self.state.write().await;
        state.insert(&self.name, doc)?;
        Ok(())
    }

    async fn insert_many(&self, docs: Vec<Document>, ordered: bool) -> VellumResult<()> {
        self.health.check(&self.database)?;
        let mut state = self.state.write().await;

        let mut first_error = None;
        for doc in docs {
            if let Err(e) = state.insert(&self.name, doc) {
                if ordered {
                    return Err(e.into());
                }
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn find_one_and_replace(
        &self,
        id: EntityId,
        doc: Document,
    ) -> VellumResult<Option<Document>> {
        self.health.check(&self.database)?;
        let mut state = self.state.write().await;

        if !state.docs.contains_key(&id) {
            return Ok(None);
        }
        if let Some(index) = state.violated_index(&doc, Some(id)) {
            return Err(StorageError::DuplicateKey {
                collection: self.name.clone(),
                index,
            }
            .into());
        }
        Ok(state.docs.insert(id, doc))
    }

    async fn find_one_and_delete(&self, id: EntityId) -> VellumResult<Option<Document>> {
        self.health.check(&self.database)?;
        let mut state = self.state.write().await;
        Ok(state.docs.remove(&id))
    }

    async fn count(&self, filter: Option<&Filter>) -> VellumResult<u64> {
        self.health.check(&self.database)?;
        let state = self.state.read().await;
        let count = match filter {
            Some(filter) => state.docs.values().filter(|d| filter.matches(d)).count(),
            None => state.docs.len(),
        };
        Ok(count as u64)
    }

    async fn list_indexes(&self) -> VellumResult<Vec<IndexInfo>> {
        self.health.check(&self.database)?;
        let state = self.state.read().await;
        if !state.materialized {
            return Err(StorageError::CollectionNotFound {
                collection: self.name.clone(),
            }
            .into());
        }

        let mut indexes = vec![IndexInfo::primary()];
        indexes.extend(state.indexes.iter().map(IndexInfo::from));
        Ok(indexes)
    }

    async fn create_index(&self, index: &IndexDeclaration) -> VellumResult<String> {
        self.health.check(&self.database)?;
        let mut state = self.state.write().await;
        let name = index.name();

        if state.indexes.iter().any(|existing| existing.name() == name) {
            return Ok(name);
        }

        if index.unique {
            let mut seen: Vec<&Value> = Vec::new();
            for doc in state.docs.values() {
                let Some(value) = indexed_value(doc, index) else {
                    continue;
                };
                if seen.contains(&value) {
                    return Err(StorageError::IndexError {
                        index_name: name,
                        reason: format!("existing documents in {} violate uniqueness", self.name),
                    }
                    .into());
                }
                seen.push(value);
            }
        }

        state.materialized = true;
        state.indexes.push(index.clone());
        self.health.index_creations.fetch_add(1, Ordering::SeqCst);
        Ok(name)
    }

    async fn estimated_document_count(&self) -> VellumResult<u64> {
        self.health.check(&self.database)?;
        let state = self.state.read().await;
        Ok(state.docs.len() as u64)
    }
}

// ============================================================================
// TESTS
// ============================================================================
