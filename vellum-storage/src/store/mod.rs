//! Document store boundary.
//!
//! The pipeline only talks to a store through [`DocumentStore`] and
//! [`DocumentCollection`]. A driver for a real document database implements
//! these two traits; [`InMemoryDocumentStore`] is the bundled implementation
//! used by the in-memory registration and by tests.

mod memory;

pub use memory::InMemoryDocumentStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vellum_core::{BackendKind, Direction, EntityId, Filter, IndexDeclaration, Query, VellumResult};

/// A stored document: the serialized form of a record.
pub type Document = serde_json::Value;

/// Description of an index that exists on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub field: String,
    pub direction: Direction,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexInfo {
    /// Name of the primary-key index every materialized collection carries.
    pub const ID_INDEX: &'static str = "_id_";

    pub fn primary() -> Self {
        Self {
            name: Self::ID_INDEX.to_string(),
            field: vellum_core::fields::ID.to_string(),
            direction: Direction::Ascending,
            unique: true,
            sparse: false,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.name == Self::ID_INDEX
    }
}

impl From<&IndexDeclaration> for IndexInfo {
    fn from(index: &IndexDeclaration) -> Self {
        Self {
            name: index.name(),
            field: index.field.clone(),
            direction: index.direction,
            unique: index.unique,
            sparse: index.sparse,
        }
    }
}

/// A document database client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Which backend this store is; checked against the configured options.
    fn kind(&self) -> BackendKind;

    /// Human-readable location used in log lines and connection errors.
    fn location(&self) -> String;

    /// Open a handle to `name` in `database`.
    ///
    /// Opening a handle does not create the collection; collections
    /// materialize on first write or index creation.
    async fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> VellumResult<Arc<dyn DocumentCollection>>;
}

/// Operations on a single named collection.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, query: &Query) -> VellumResult<Vec<Document>>;

    async fn find_one(&self, filter: Option<&Filter>) -> VellumResult<Option<Document>> {
        let query = Query {
            filter: filter.cloned(),
            ..Query::all()
        }
        .take(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    async fn insert_one(&self, doc: Document) -> VellumResult<()>;

    /// Insert several documents. With `ordered == false` every document that
    /// can be inserted is, and the first failure is reported afterwards.
    async fn insert_many(&self, docs: Vec<Document>, ordered: bool) -> VellumResult<()>;

    /// Replace the document with `id`, returning the previous version.
    async fn find_one_and_replace(
        &self,
        id: EntityId,
        doc: Document,
    ) -> VellumResult<Option<Document>>;

    /// Remove the document with `id`, returning it.
    async fn find_one_and_delete(&self, id: EntityId) -> VellumResult<Option<Document>>;

    async fn count(&self, filter: Option<&Filter>) -> VellumResult<u64>;

    /// List existing indexes. Fails with `CollectionNotFound` when the
    /// collection has not been materialized.
    async fn list_indexes(&self) -> VellumResult<Vec<IndexInfo>>;

    /// Create an index and return its name. Creating an index that already
    /// exists is a no-op.
    async fn create_index(&self, index: &IndexDeclaration) -> VellumResult<String>;

    async fn estimated_document_count(&self) -> VellumResult<u64>;
}
