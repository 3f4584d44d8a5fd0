//! Vellum Core - Record Contract and Shared Types
//!
//! Data types every other Vellum crate depends on: the record contract with
//! its identity and audit fields, index declarations, field filters, the
//! options a registry is built from, and the error hierarchy.

pub mod clone;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod index;
pub mod record;

pub use clone::DeepClone;
pub use config::{
    AuditPolicy, BackendKind, BackendOptions, CollectionOptions, DocumentStoreOptions,
    DEFAULT_CACHE_DURATION, DEFAULT_ENVIRONMENT,
};
pub use error::{ConfigError, StorageError, VellumError, VellumResult};
pub use filter::{Filter, FilterExpr, FilterOperator, Query, SortKey};
pub use identity::{actor_is_set, is_assigned, new_entity_id, ActorId, EntityId, Timestamp};
pub use index::{Direction, IndexDeclaration};
pub use record::{fields, Record, RecordMeta};
