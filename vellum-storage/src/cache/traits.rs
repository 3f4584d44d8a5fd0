//! Cache service trait and typed helpers.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use vellum_core::VellumResult;

/// A shared key/value cache.
///
/// Values are stored in their serialized form so one cache can hold entries
/// of every record type. Calls never block on I/O, so the trait is
/// synchronous and usable from inside async pipelines without awaiting.
pub trait CacheService: Send + Sync {
    /// Get a live value. Expired entries count as missing.
    fn get_value(&self, key: &str) -> Option<Value>;

    /// Store a value. `ttl == None` keeps it until removed.
    fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Store a value only when no live entry exists under `key`. A live
    /// entry keeps its value but lives at least as long as `ttl` asks.
    /// Returns whether the value was written.
    fn set_value_if_absent(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool;

    /// Remove a value, returning whether a live entry was removed.
    fn remove(&self, key: &str) -> bool;

    /// All live values whose key starts with `prefix`.
    fn values_with_prefix(&self, prefix: &str) -> Vec<Value>;

    /// Usage counters.
    fn stats(&self) -> CacheStats;

    fn contains(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }
}

/// Typed access on top of [`CacheService`].
pub trait CacheServiceExt: CacheService {
    fn get<T: DeserializeOwned>(&self, key: &str) -> VellumResult<Option<T>> {
        match self.get_value(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> VellumResult<()> {
        self.set_value(key, serde_json::to_value(value)?, ttl);
        Ok(())
    }

    fn set_if_absent<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> VellumResult<bool> {
        Ok(self.set_value_if_absent(key, serde_json::to_value(value)?, ttl))
    }
}

impl<C: CacheService + ?Sized> CacheServiceExt for C {}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of live entries.
    pub entry_count: u64,
    /// Number of entries dropped because they expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let empty = CacheStats::default();
        assert_eq!(empty.hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
