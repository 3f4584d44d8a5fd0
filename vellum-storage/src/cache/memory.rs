//! DashMap-backed cache service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::traits::{CacheService, CacheStats};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache shared across units of work.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        self.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheService for MemoryCache {
    fn get_value(&self, key: &str) -> Option<Value> {
        let now = Instant::now();

        // The shard guard must be released before an expired entry is removed.
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired && self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    fn set_value_if_absent(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let fresh = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| now + ttl),
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_expired(now) => {
                occupied.insert(fresh);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.expires_at = match (entry.expires_at, fresh.expires_at) {
                    (Some(current), Some(wanted)) => Some(current.max(wanted)),
                    _ => None,
                };
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now))
    }

    fn values_with_prefix(&self, prefix: &str) -> Vec<Value> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.is_expired(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let live = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: live as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheServiceExt;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!(1), None);

        assert_eq!(cache.get_value("a"), Some(json!(1)));
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.get_value("a"), None);
    }

    #[test]
    fn test_set_if_absent_keeps_live_entry() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!("newer"), None);

        assert!(!cache.set_value_if_absent("a", json!("older"), None));
        assert_eq!(cache.get_value("a"), Some(json!("newer")));

        assert!(cache.set_value_if_absent("b", json!(2), None));
        assert_eq!(cache.get_value("b"), Some(json!(2)));
    }

    #[test]
    fn test_set_if_absent_extends_live_entry() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!(1), Some(Duration::from_millis(50)));

        assert!(!cache.set_value_if_absent("a", json!(0), None));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(cache.get_value("a"), Some(json!(1)));
    }

    #[test]
    fn test_set_if_absent_replaces_expired_entry() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!(1), Some(Duration::ZERO));

        assert!(cache.set_value_if_absent("a", json!(2), None));
        assert_eq!(cache.get_value("a"), Some(json!(2)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_typed_helpers() {
        let cache = MemoryCache::new();
        cache.set("index_Customer", &true, None).unwrap();

        assert_eq!(cache.get::<bool>("index_Customer").unwrap(), Some(true));
        assert_eq!(cache.get::<bool>("index_Order").unwrap(), None);
        assert!(cache.get::<u32>("index_Customer").is_err());
    }

    #[test]
    fn test_expired_entries_are_missing() {
        let cache = MemoryCache::new();
        cache.set_value("short", json!("x"), Some(Duration::ZERO));
        cache.set_value("long", json!("y"), Some(Duration::from_secs(3600)));

        assert_eq!(cache.get_value("short"), None);
        assert_eq!(cache.get_value("long"), Some(json!("y")));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!(1), Some(Duration::ZERO));
        cache.set_value("b", json!(2), Some(Duration::ZERO));
        cache.set_value("c", json!(3), None);

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_values_with_prefix() {
        let cache = MemoryCache::new();
        cache.set_value("db/Customer:1", json!(1), None);
        cache.set_value("db/Customer:2", json!(2), None);
        cache.set_value("db/Order:1", json!(3), None);
        cache.set_value("db/Customer:3", json!(4), Some(Duration::ZERO));

        let mut values: Vec<i64> = cache
            .values_with_prefix("db/Customer:")
            .into_iter()
            .filter_map(|v| v.as_i64())
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = MemoryCache::new();
        cache.set_value("a", json!(1), None);
        cache.get_value("a");
        cache.get_value("a");
        cache.get_value("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
