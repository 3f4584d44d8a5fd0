//! The record contract every stored entity carries.
//!
//! Entities embed a [`RecordMeta`] with `#[serde(flatten)]`, so the identity
//! and audit fields sit at the top level of the stored document next to the
//! entity's own fields:
//!
//! ```ignore
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct Customer {
//!     #[serde(flatten)]
//!     pub meta: RecordMeta,
//!     pub email: String,
//! }
//!
//! impl Record for Customer {
//!     fn collection_name() -> &'static str { "Customer" }
//!     fn meta(&self) -> &RecordMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
//!     fn indexes() -> Vec<IndexDeclaration> {
//!         vec![IndexDeclaration::ascending("email").unique()]
//!     }
//! }
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::identity::{ActorId, EntityId, Timestamp};
use crate::index::IndexDeclaration;

/// Stored field names of the record metadata.
pub mod fields {
    pub const ID: &str = "_id";
    pub const CREATED_BY: &str = "created_by";
    pub const CREATED_AT: &str = "created_at";
    pub const LAST_MODIFIED_BY: &str = "last_modified_by";
    pub const LAST_MODIFIED_AT: &str = "last_modified_at";
    pub const IS_DELETED: &str = "is_deleted";
}

/// Identity and audit fields shared by all records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Record identifier; nil until assigned.
    #[serde(rename = "_id", default)]
    pub id: EntityId,
    /// User identifier of the author of this record.
    #[serde(default)]
    pub created_by: Option<ActorId>,
    /// When this record was created.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// User identifier of the last person to modify this record.
    #[serde(default)]
    pub last_modified_by: Option<ActorId>,
    /// When this record was last modified.
    #[serde(default)]
    pub last_modified_at: Option<Timestamp>,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_deleted: bool,
}

impl RecordMeta {
    /// Metadata with only the identifier set.
    pub fn with_id(id: EntityId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// A persisted entity type.
///
/// Implementors must be `Clone`, `Serialize`, `DeserializeOwned` and
/// `Send + Sync + 'static` so pipelines can move them across tasks and the
/// cache can store them.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the backing collection; also the entity type name used for
    /// the index-ready flag and never-evict configuration.
    fn collection_name() -> &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Secondary indexes this type declares.
    fn indexes() -> Vec<IndexDeclaration> {
        Vec::new()
    }

    /// How long cached entries of this type live; `None` uses the configured
    /// default.
    fn cache_duration() -> Option<Duration> {
        None
    }

    fn id(&self) -> EntityId {
        self.meta().id
    }

    fn is_deleted(&self) -> bool {
        self.meta().is_deleted
    }
}
