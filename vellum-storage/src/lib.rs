//! Vellum Storage - decorated per-entity collections over a document store
//!
//! A [`UnitOfWork`] hands out one [`Collection`] per record type. Each
//! collection is a stack of decorators over a [`StoreCollection`]:
//!
//! ```text
//! TimingDecorator (optional)
//!   └─ SoftDeleteDecorator
//!        └─ FillDefaultsDecorator
//!             └─ CacheDecorator
//!                  └─ StoreCollection ── DocumentStore
//! ```
//!
//! ```ignore
//! let services = PersistenceServices::in_memory();
//! let uow = services.unit_of_work()?.with_actor(user_id);
//! let customers = uow.collection::<Customer>().await?;
//! let saved = customers.add(customer).await?;
//! ```

pub mod adapter;
pub mod cache;
pub mod collection;
pub mod decorators;
pub mod registry;
pub mod setup;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use adapter::StoreCollection;
pub use cache::{index_ready_key, CacheService, CacheServiceExt, CacheStats, MemoryCache};
pub use collection::{Collection, SharedCollection};
pub use decorators::{CacheDecorator, FillDefaultsDecorator, SoftDeleteDecorator, TimingDecorator};
pub use registry::{build_pipeline, UnitOfWork, IN_MEMORY_DATABASE};
pub use setup::PersistenceServices;
pub use store::{Document, DocumentCollection, DocumentStore, InMemoryDocumentStore, IndexInfo};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

pub use vellum_core::{VellumError, VellumResult};
