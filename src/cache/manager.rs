//! Response cache with TTL expiry and bounded-size eviction
//!
//! Provides a `ResponseCache` that stores serializable data as JSON under a
//! namespaced key in any [`KeyValueStore`]. Entries expire lazily on read and
//! the oldest writes are evicted once the namespace holds too many entries.
//! Storage problems never reach the caller: reads degrade to a miss and
//! writes are dropped.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::store::{KeyValueStore, StoreError};

/// Prefix separating cache entries from other data in the same store
pub const CACHE_PREFIX: &str = "tsm_cache_";

/// Maximum number of cache entries kept after a write
pub const MAX_CACHE_ENTRIES: usize = 50;

/// How long an entry stays fresh, in minutes
pub const CACHE_TTL_MINUTES: i64 = 5;

/// Wrapper struct for cached data in the store
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached, in epoch milliseconds
    timestamp: i64,
}

/// Only the timestamp of an entry, used when ranking entries for eviction
#[derive(Debug, Deserialize)]
struct EntryStamp {
    timestamp: i64,
}

/// Tunables for a [`ResponseCache`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace prefix applied to every key
    pub prefix: String,
    /// Time-to-live of an entry
    pub ttl: Duration,
    /// Entry bound enforced after each write
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: CACHE_PREFIX.to_string(),
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
            max_entries: MAX_CACHE_ENTRIES,
        }
    }
}

/// Best-effort local cache over a key-value store
///
/// Each entry is stored as `{"data": ..., "timestamp": <epoch-ms>}` under
/// `prefix + key`. Eviction runs inline after every successful write and
/// removes entries with the oldest write timestamps first, so recency is
/// measured by write rather than by read.
pub struct ResponseCache<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl<S: KeyValueStore> ResponseCache<S> {
    /// Creates a cache with the default prefix, TTL and capacity
    pub fn new(store: S) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Creates a cache with custom settings
    ///
    /// `max_entries` is clamped to at least 1.
    pub fn with_config(store: S, mut config: CacheConfig) -> Self {
        config.max_entries = config.max_entries.max(1);
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the time source, mainly so tests can control expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active settings
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// An age that cannot be computed counts as expired
    fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        now.checked_sub(timestamp)
            .map_or(true, |age| age > self.config.ttl.num_milliseconds())
    }

    /// Reads a fresh entry
    ///
    /// Returns `None` if the key was never written, was cleared, has expired,
    /// or cannot be decoded as `T`. An expired entry is removed from the
    /// store as a side effect.
    pub fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.namespaced(key);
        let raw = match self.store.get(&full_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, "Cache read failed: {}", e);
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, "Cached value unreadable, treating as miss: {}", e);
                return None;
            }
        };

        if self.is_expired(entry.timestamp, self.clock.now_millis()) {
            debug!(key, "Cache entry expired, removing");
            self.remove_quietly(&full_key);
            return None;
        }

        Some(entry.data)
    }

    /// Writes `data` under `key`, stamped with the current time
    ///
    /// Failures (serialization, quota, I/O) are logged and dropped. A
    /// successful write is followed by an eviction pass.
    pub fn set_cache<T: Serialize>(&self, key: &str, data: &T) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, "Failed to serialize cache entry: {}", e);
                return;
            }
        };

        let full_key = self.namespaced(key);
        match self.store.set(&full_key, &json) {
            Ok(()) => self.evict_oldest(&full_key),
            Err(StoreError::QuotaExceeded { used, limit }) => {
                warn!(key, used, limit, "Cache store full, skipping write");
            }
            Err(e) => warn!(key, "Cache write failed: {}", e),
        }
    }

    /// Removes a single entry
    pub fn clear_cache(&self, key: &str) {
        self.remove_quietly(&self.namespaced(key));
    }

    /// Removes every entry in the cache namespace, leaving other keys alone
    pub fn clear_all_cache(&self) {
        for key in self.cache_keys() {
            self.remove_quietly(&key);
        }
    }

    /// Number of entries currently in the namespace, expired ones included
    pub fn len(&self) -> usize {
        self.cache_keys().len()
    }

    /// Returns `true` if the namespace holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fresh cached value for `key`, or runs `fetch` and caches
    /// its successful result
    ///
    /// Errors from `fetch` are returned unchanged and nothing is cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get_cached(key) {
            return Ok(cached);
        }

        let fresh = fetch().await?;
        self.set_cache(key, &fresh);
        Ok(fresh)
    }

    // -- private helpers ---------------------------------------------------

    fn cache_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.config.prefix))
                .collect(),
            Err(e) => {
                warn!("Failed to list cache keys: {}", e);
                Vec::new()
            }
        }
    }

    fn remove_quietly(&self, full_key: &str) {
        if let Err(e) = self.store.remove(full_key) {
            warn!(key = full_key, "Failed to remove cache entry: {}", e);
        }
    }

    /// Read an entry's write time; anything unreadable counts as oldest
    fn stamp_of(&self, full_key: &str) -> i64 {
        self.store
            .get(full_key)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str::<EntryStamp>(&raw).ok())
            .map(|stamp| stamp.timestamp)
            .unwrap_or(0)
    }

    /// Evicts down to `max_entries`, never touching `just_written`
    fn evict_oldest(&self, just_written: &str) {
        let keys = self.cache_keys();
        if keys.len() <= self.config.max_entries {
            return;
        }

        let excess = keys.len() - self.config.max_entries;
        let mut stamped: Vec<(i64, String)> = keys
            .into_iter()
            .filter(|key| key != just_written)
            .map(|key| (self.stamp_of(&key), key))
            .collect();
        stamped.sort();

        for (_, key) in stamped.into_iter().take(excess) {
            debug!(key = %key, "Evicting oldest cache entry");
            self.remove_quietly(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::store::{FileStore, MemoryStore};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn sample(name: &str, value: i32) -> TestData {
        TestData {
            name: name.to_string(),
            value,
        }
    }

    fn create_test_cache() -> (ResponseCache<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = ResponseCache::new(MemoryStore::new()).with_clock(clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _clock) = create_test_cache();
        let result: Option<TestData> = cache.get_cached("nonexistent_key");
        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (cache, _clock) = create_test_cache();
        let data = sample("show", 42);

        cache.set_cache("shows", &data);

        let result: TestData = cache.get_cached("shows").expect("Should read fresh cache");
        assert_eq!(result, data);
    }

    #[test]
    fn test_entries_are_namespaced_with_prefix() {
        let (cache, _clock) = create_test_cache();
        cache.set_cache("budget_items", &sample("b", 1));

        let raw = cache
            .store()
            .get("tsm_cache_budget_items")
            .unwrap()
            .expect("Entry should be stored under the prefix");
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["data"]["name"], "b");
        assert_eq!(value["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_expired_entry_is_absent_and_removed() {
        let (cache, clock) = create_test_cache();
        cache.set_cache("shows", &sample("old", 1));

        clock.advance(Duration::minutes(5) + Duration::milliseconds(1));

        let result: Option<TestData> = cache.get_cached("shows");
        assert!(result.is_none(), "Entry past TTL should be absent");
        assert!(
            cache.store().get("tsm_cache_shows").unwrap().is_none(),
            "Expired entry should be removed from the store"
        );
    }

    #[test]
    fn test_entry_exactly_at_ttl_is_still_fresh() {
        let (cache, clock) = create_test_cache();
        cache.set_cache("shows", &sample("edge", 1));

        clock.advance(Duration::minutes(5));

        let result: Option<TestData> = cache.get_cached("shows");
        assert_eq!(result, Some(sample("edge", 1)));
    }

    #[test]
    fn test_corrupt_entry_reads_as_missing() {
        let (cache, _clock) = create_test_cache();
        cache.store().set("tsm_cache_broken", "{not json").unwrap();

        let result: Option<TestData> = cache.get_cached("broken");
        assert!(result.is_none());
    }

    #[test]
    fn test_wrong_shape_reads_as_missing() {
        let (cache, _clock) = create_test_cache();
        cache.set_cache("shows", &"just a string");

        let result: Option<TestData> = cache.get_cached("shows");
        assert!(result.is_none());
    }

    #[test]
    fn test_eviction_keeps_most_recent_writes() {
        let (cache, clock) = create_test_cache();

        for i in 0..60 {
            cache.set_cache(&format!("key_{i}"), &sample("v", i));
            clock.advance(Duration::milliseconds(1));
        }

        assert_eq!(cache.len(), MAX_CACHE_ENTRIES);
        for i in 0..10 {
            let result: Option<TestData> = cache.get_cached(&format!("key_{i}"));
            assert!(result.is_none(), "key_{i} should have been evicted");
        }
        for i in 10..60 {
            let result: Option<TestData> = cache.get_cached(&format!("key_{i}"));
            assert_eq!(result, Some(sample("v", i)), "key_{i} should be retained");
        }
    }

    #[test]
    fn test_extreme_stored_timestamp_reads_as_missing() {
        let (cache, _clock) = create_test_cache();
        let raw = format!("{{\"data\":1,\"timestamp\":{}}}", i64::MIN);
        cache.store().set("tsm_cache_x", &raw).unwrap();

        assert!(cache.get_cached::<i32>("x").is_none());
        assert!(
            cache.store().get("tsm_cache_x").unwrap().is_none(),
            "Unreadable age should be treated as expired and removed"
        );
    }

    #[test]
    fn test_write_survives_eviction_with_frozen_clock() {
        let (cache, _clock) = create_test_cache();

        for i in 0..MAX_CACHE_ENTRIES {
            cache.set_cache(&format!("k{i:02}"), &i);
        }
        // Sorts before every existing key and shares their timestamp
        cache.set_cache("a_new", &999);

        assert_eq!(cache.get_cached::<i32>("a_new"), Some(999));
        assert_eq!(cache.len(), MAX_CACHE_ENTRIES);
    }

    #[test]
    fn test_rewrite_refreshes_eviction_order() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig {
            max_entries: 3,
            ..CacheConfig::default()
        };
        let cache = ResponseCache::with_config(MemoryStore::new(), config).with_clock(clock.clone());

        for key in ["a", "b", "c"] {
            cache.set_cache(key, &1);
            clock.advance(Duration::milliseconds(10));
        }
        // Rewriting "a" makes "b" the oldest
        cache.set_cache("a", &2);
        clock.advance(Duration::milliseconds(10));
        cache.set_cache("d", &3);

        assert_eq!(cache.get_cached::<i32>("a"), Some(2));
        assert!(cache.get_cached::<i32>("b").is_none());
        assert_eq!(cache.get_cached::<i32>("c"), Some(1));
        assert_eq!(cache.get_cached::<i32>("d"), Some(3));
    }

    #[test]
    fn test_corrupt_entries_are_evicted_first() {
        let clock = Arc::new(ManualClock::new(5_000));
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache = ResponseCache::with_config(MemoryStore::new(), config).with_clock(clock.clone());

        cache.store().set("tsm_cache_garbage", "???").unwrap();
        cache.set_cache("one", &1);
        clock.advance(Duration::milliseconds(1));
        cache.set_cache("two", &2);

        assert_eq!(cache.len(), 2);
        assert!(cache.store().get("tsm_cache_garbage").unwrap().is_none());
        assert_eq!(cache.get_cached::<i32>("one"), Some(1));
        assert_eq!(cache.get_cached::<i32>("two"), Some(2));
    }

    #[test]
    fn test_eviction_ignores_unrelated_keys() {
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig {
            max_entries: 1,
            ..CacheConfig::default()
        };
        let cache = ResponseCache::with_config(MemoryStore::new(), config).with_clock(clock.clone());
        cache.store().set("user_prefs", "{\"theme\":\"dark\"}").unwrap();

        cache.set_cache("one", &1);
        clock.advance(Duration::milliseconds(1));
        cache.set_cache("two", &2);

        assert_eq!(cache.len(), 1);
        assert!(cache.store().get("user_prefs").unwrap().is_some());
    }

    #[test]
    fn test_clear_cache_removes_single_entry() {
        let (cache, _clock) = create_test_cache();
        cache.set_cache("a", &1);
        cache.set_cache("b", &2);

        cache.clear_cache("a");

        assert!(cache.get_cached::<i32>("a").is_none());
        assert_eq!(cache.get_cached::<i32>("b"), Some(2));
        // Clearing a missing key is a no-op
        cache.clear_cache("missing");
    }

    #[test]
    fn test_clear_all_leaves_other_data_untouched() {
        let (cache, _clock) = create_test_cache();
        cache.store().set("auth_session", "token").unwrap();
        cache.set_cache("a", &1);
        cache.set_cache("b", &2);

        cache.clear_all_cache();

        assert!(cache.get_cached::<i32>("a").is_none());
        assert!(cache.get_cached::<i32>("b").is_none());
        assert!(cache.is_empty());
        assert_eq!(
            cache.store().get("auth_session").unwrap().as_deref(),
            Some("token")
        );
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let cache = ResponseCache::new(MemoryStore::with_quota(64));
        let big = "x".repeat(200);

        cache.set_cache("big", &big);

        assert!(cache.get_cached::<String>("big").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_quota_exceeded_keeps_previous_value() {
        let cache = ResponseCache::new(MemoryStore::with_quota(100));
        cache.set_cache("k", &"small");

        cache.set_cache("k", &"y".repeat(200));

        assert_eq!(cache.get_cached::<String>("k").as_deref(), Some("small"));
    }

    #[test]
    fn test_max_entries_is_clamped_to_one() {
        let config = CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        };
        let cache = ResponseCache::with_config(MemoryStore::new(), config);
        assert_eq!(cache.config().max_entries, 1);

        cache.set_cache("only", &1);
        assert_eq!(cache.get_cached::<i32>("only"), Some(1));
    }

    #[test]
    fn test_file_backed_cache_survives_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");

        let cache = ResponseCache::new(FileStore::with_path(path.clone()));
        cache.set_cache("shows", &sample("persisted", 7));

        let reopened = ResponseCache::new(FileStore::with_path(path));
        assert_eq!(
            reopened.get_cached::<TestData>("shows"),
            Some(sample("persisted", 7))
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_uses_cache_when_fresh() {
        let (cache, _clock) = create_test_cache();
        let mut calls = 0;

        let first: Result<i32, String> = cache
            .get_or_fetch("count", || {
                calls += 1;
                async { Ok(10) }
            })
            .await;
        assert_eq!(first, Ok(10));

        let second: Result<i32, String> = cache
            .get_or_fetch("count", || async { Ok(99) })
            .await;
        assert_eq!(second, Ok(10), "Fresh cached value should win");
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_after_expiry() {
        let (cache, clock) = create_test_cache();
        cache.set_cache("count", &1);
        clock.advance(Duration::minutes(6));

        let result: Result<i32, String> = cache.get_or_fetch("count", || async { Ok(2) }).await;
        assert_eq!(result, Ok(2));
        assert_eq!(cache.get_cached::<i32>("count"), Some(2));
    }

    #[tokio::test]
    async fn test_get_or_fetch_does_not_cache_errors() {
        let (cache, _clock) = create_test_cache();

        let result: Result<i32, String> = cache
            .get_or_fetch("count", || async { Err("offline".to_string()) })
            .await;

        assert_eq!(result, Err("offline".to_string()));
        assert!(cache.is_empty());
    }
}
