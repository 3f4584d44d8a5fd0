//! Process-wide key/value cache.
//!
//! One cache instance is shared by every unit of work. It holds two kinds of
//! entries:
//!
//! - index-ready flags, keyed `index_{collection}`, written once a
//!   collection's declared indexes exist;
//! - cached records, keyed by database, collection and record id, written by
//!   the cache decorator.
//!
//! Entries carry an optional expiry. Expired entries are purged lazily on
//! access or explicitly with [`MemoryCache::purge_expired`].

mod memory;
mod traits;

pub use memory::MemoryCache;
pub use traits::{CacheService, CacheServiceExt, CacheStats};

/// Cache key of the index-ready flag for a collection.
pub fn index_ready_key(collection_name: &str) -> String {
    format!("index_{}", collection_name)
}
