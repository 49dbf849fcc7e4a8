//! In-memory TTL cache with least-recently-used eviction.
//!
//! Entries expire lazily: an expired entry stays in memory until it is looked up,
//! invalidated, or swept by [`Cache::cleanup`]. The recency index and the entry map
//! always hold the same key set; both live behind a single lock.

use chrono::{DateTime, Utc};
use guildbot_core::CacheStats;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::pattern::KeyPattern;

/// Position of an entry in the recency order. The sequence number breaks ties
/// between accesses that share an `Instant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct AccessStamp {
    at: Instant,
    seq: u64,
}

/// A cached value with metadata.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    created_at: DateTime<Utc>,
    last_access: AccessStamp,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
    invalidations: u64,
    expirations: u64,
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    access_order: BTreeMap<AccessStamp, String>,
    next_seq: u64,
    counters: Counters,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            access_order: BTreeMap::new(),
            next_seq: 0,
            counters: Counters::default(),
        }
    }

    fn stamp(&mut self, now: Instant) -> AccessStamp {
        let stamp = AccessStamp {
            at: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        stamp
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.access_order.remove(&entry.last_access);
        Some(entry)
    }

    fn touch(&mut self, key: &str, now: Instant) {
        let stamp = self.stamp(now);
        if let Some(entry) = self.entries.get_mut(key) {
            self.access_order.remove(&entry.last_access);
            entry.last_access = stamp;
            self.access_order.insert(stamp, key.to_string());
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.access_order.pop_first()?;
        self.entries.remove(&key);
        self.counters.evictions += 1;
        Some(key)
    }

    /// Purges `key` if it has expired. Returns true when something was purged.
    fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            self.remove(key);
            self.counters.expirations += 1;
        }
        expired
    }
}

/// Bounded key-value store with per-entry TTL and LRU eviction.
pub struct Cache<V> {
    config: CacheConfig,
    inner: Mutex<CacheInner<V>>,
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> Cache<V> {
    /// Creates a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::new()),
        }
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Inserts a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Inserts a value with a custom TTL.
    ///
    /// Inserting a new key into a full cache first evicts the least recently used
    /// entry. Overwriting an existing key never evicts.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let existed = inner.remove(&key).is_some();
        if !existed && inner.entries.len() >= self.config.max_size {
            if let Some(evicted) = inner.evict_lru() {
                debug!(key = %evicted, "Evicted least recently used cache entry");
            }
        }

        let stamp = inner.stamp(now);
        inner.access_order.insert(stamp, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                ttl,
                created_at: Utc::now(),
                last_access: stamp,
            },
        );
        inner.counters.sets += 1;
    }

    /// Existence probe. Does not count as a hit or miss and does not refresh
    /// recency, but purges the entry if it has expired.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if inner.purge_if_expired(key, now) {
            return false;
        }
        inner.entries.contains_key(key)
    }

    /// Removes a single entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.remove(key).is_some();
        if removed {
            inner.counters.invalidations += 1;
        }
        removed
    }

    /// Removes every live entry whose key matches `pattern`. Returns the number of
    /// live entries removed; expired matches are purged without being counted.
    pub fn invalidate_pattern(&self, pattern: &KeyPattern) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let matched: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();

        let mut removed = 0;
        for key in matched {
            if let Some(entry) = inner.remove(&key) {
                if entry.is_expired(now) {
                    inner.counters.expirations += 1;
                } else {
                    removed += 1;
                }
            }
        }
        inner.counters.invalidations += removed as u64;

        debug!(pattern = pattern.as_str(), removed, "Invalidated cache entries by pattern");
        removed
    }

    /// Glob shorthand for [`Cache::invalidate_pattern`].
    pub fn invalidate_glob(&self, glob: &str) -> Result<usize, CacheError> {
        let pattern = KeyPattern::glob(glob)?;
        Ok(self.invalidate_pattern(&pattern))
    }

    /// Clears all entries from the cache. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.access_order.clear();
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.counters.expirations += expired.len() as u64;

        if !expired.is_empty() {
            trace!(removed = expired.len(), "Cleaned up expired cache entries");
        }
        expired.len()
    }

    /// Gets the current number of entries, expired ones not yet purged included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Checks if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Cache<V> {
    /// Gets a value from the cache, refreshing its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_with_created_at(key).map(|(value, _)| value)
    }

    /// Like [`Cache::get`], also returning when the entry was stored.
    pub fn get_with_created_at(&self, key: &str) -> Option<(V, DateTime<Utc>)> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.purge_if_expired(key, now) || !inner.entries.contains_key(key) {
            inner.counters.misses += 1;
            return None;
        }

        inner.counters.hits += 1;
        inner.touch(key, now);
        inner
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.created_at))
    }
}

impl<V: Serialize> Cache<V> {
    /// Gets cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();

        let memory_usage = inner
            .entries
            .iter()
            .map(|(key, entry)| {
                key.len()
                    + serde_json::to_string(&entry.value)
                        .map(|json| json.len())
                        .unwrap_or(0)
            })
            .sum();

        let counters = &inner.counters;
        CacheStats {
            size: inner.entries.len(),
            max_size: self.config.max_size,
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            evictions: counters.evictions,
            invalidations: counters.invalidations,
            expirations: counters.expirations,
            hit_rate: CacheStats::compute_hit_rate(counters.hits, counters.misses),
            memory_usage,
            collected_at: Utc::now(),
        }
    }
}

/// Wrapper for cached results with hit/miss tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult<T> {
    /// The cached value.
    pub value: T,

    /// Whether this was a cache hit.
    pub was_cached: bool,

    /// Timestamp when the value was retrieved.
    pub retrieved_at: DateTime<Utc>,

    /// Original creation time of the cached entry (if cached).
    pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CachedResult<T> {
    /// Creates a new CachedResult from a cache hit.
    pub fn hit(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            was_cached: true,
            retrieved_at: Utc::now(),
            cached_at: Some(cached_at),
        }
    }

    /// Creates a new CachedResult from a cache miss.
    pub fn miss(value: T) -> Self {
        Self {
            value,
            was_cached: false,
            retrieved_at: Utc::now(),
            cached_at: None,
        }
    }
}

/// Cache-aside helper: returns the cached value for `key`, or runs `fetch_fn` and
/// stores its result with the default TTL. Fetch errors are not cached.
pub async fn cached<V, E, F, Fut>(
    cache: &Cache<V>,
    key: &str,
    fetch_fn: F,
) -> Result<CachedResult<V>, E>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    if let Some((value, created_at)) = cache.get_with_created_at(key) {
        return Ok(CachedResult::hit(value, created_at));
    }

    let value = fetch_fn().await?;
    cache.set(key, value.clone());

    Ok(CachedResult::miss(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread::sleep;

    fn cache_with(max_size: usize, ttl: Duration) -> Cache<String> {
        let config = CacheConfig::builder()
            .max_size(max_size)
            .default_ttl(ttl)
            .build()
            .unwrap();
        Cache::new(config)
    }

    #[test]
    fn test_cache_basic() {
        let cache = cache_with(100, Duration::from_secs(60));

        cache.set("key1", "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache: Cache<String> = Cache::new(CacheConfig::default());
        assert_eq!(cache.get("nonexistent"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_expiration() {
        let cache = cache_with(100, Duration::from_millis(100));

        cache.set("key1", "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));

        sleep(Duration::from_millis(150));

        assert_eq!(cache.get("key1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = cache_with(100, Duration::from_secs(60));

        cache.set_with_ttl("key1", "value1".to_string(), Duration::ZERO);
        sleep(Duration::from_millis(5));

        assert_eq!(cache.get("key1"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_stored_none_is_distinct_from_absent() {
        let cache: Cache<Option<String>> = Cache::new(CacheConfig::default());
        cache.set("nothing", None);

        assert_eq!(cache.get("nothing"), Some(None));
        assert_eq!(cache.get("absent"), None);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache_with(2, Duration::from_secs(60));

        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("3".to_string()));
        assert_eq!(cache.get("b"), Some("2".to_string()));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_eviction_lru() {
        let cache = cache_with(2, Duration::from_secs(60));

        cache.set("key1", "value1".to_string());
        cache.set("key2", "value2".to_string());

        // Access key1 to make it more recently used
        cache.get("key1");

        // This should evict key2 (least recently used)
        cache.set("key3", "value3".to_string());

        assert!(cache.has("key1"));
        assert!(!cache.has("key2"));
        assert!(cache.has("key3"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_has_does_not_refresh_recency() {
        let cache = cache_with(2, Duration::from_secs(60));

        cache.set("old", "1".to_string());
        cache.set("new", "2".to_string());
        assert!(cache.has("old"));

        cache.set("newest", "3".to_string());

        assert!(!cache.has("old"));
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_has_purges_expired() {
        let cache = cache_with(10, Duration::from_millis(20));
        cache.set("key", "v".to_string());

        sleep(Duration::from_millis(40));

        assert!(!cache.has("key"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_invalidate() {
        let cache = cache_with(10, Duration::from_secs(60));
        cache.set("key", "v".to_string());

        assert!(cache.invalidate("key"));
        assert!(!cache.invalidate("key"));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_invalidate_pattern() {
        let cache = cache_with(10, Duration::from_secs(60));

        cache.set("user:1", "data1".to_string());
        cache.set("user:2", "data2".to_string());
        cache.set("product:1", "data3".to_string());

        let removed = cache.invalidate_glob("user:*").unwrap();

        assert_eq!(removed, 2);
        assert!(cache.get("user:1").is_none());
        assert!(cache.get("user:2").is_none());
        assert!(cache.get("product:1").is_some());
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_invalidate_pattern_skips_expired_in_count() {
        let cache = cache_with(10, Duration::from_secs(60));

        cache.set_with_ttl("user:stale", "x".to_string(), Duration::ZERO);
        cache.set("user:live", "y".to_string());

        let pattern = KeyPattern::glob("user:*").unwrap();
        assert_eq!(cache.invalidate_pattern(&pattern), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = cache_with(10, Duration::from_secs(60));

        cache.set("key1", "value1".to_string());
        cache.set("key2", "value2".to_string());
        cache.get("key1");

        cache.clear();

        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let cache = cache_with(10, Duration::from_secs(60));

        cache.set_with_ttl("short", "a".to_string(), Duration::from_millis(10));
        cache.set("long", "b".to_string());
        sleep(Duration::from_millis(30));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("long"));
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_cleanup_frees_capacity_without_eviction() {
        let cache = cache_with(2, Duration::from_secs(60));

        cache.set_with_ttl("a", "1".to_string(), Duration::ZERO);
        cache.set_with_ttl("b", "2".to_string(), Duration::ZERO);
        cache.cleanup();

        cache.set("c", "3".to_string());
        cache.set("d", "4".to_string());

        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_statistics() {
        let cache = cache_with(10, Duration::from_secs(60));

        cache.set("key1", "value1".to_string());

        // Generate some hits
        cache.get("key1");
        cache.get("key1");

        // Generate a miss
        cache.get("key2");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_memory_usage_estimate() {
        let cache = cache_with(10, Duration::from_secs(60));
        cache.set("abc", "hello".to_string());

        // "abc" (3) + "\"hello\"" (7)
        assert_eq!(cache.stats().memory_usage, 10);
    }

    #[test]
    fn test_get_with_created_at() {
        let cache = cache_with(10, Duration::from_secs(60));
        let before = Utc::now();
        cache.set("key", "value".to_string());

        let (value, created_at) = cache.get_with_created_at("key").unwrap();
        assert_eq!(value, "value");
        assert!(created_at >= before);
    }

    #[test]
    fn test_cached_result_hit() {
        let result = CachedResult::hit("value".to_string(), Utc::now());
        assert!(result.was_cached);
        assert!(result.cached_at.is_some());
    }

    #[test]
    fn test_cached_result_miss() {
        let result = CachedResult::miss("value".to_string());
        assert!(!result.was_cached);
        assert!(result.cached_at.is_none());
    }

    #[tokio::test]
    async fn test_cached_function_wrapper() {
        let cache = cache_with(10, Duration::from_secs(60));

        let fetch_count = Arc::new(AtomicU64::new(0));

        // First call should fetch
        let count = fetch_count.clone();
        let result1 = cached(&cache, "key1", || async move {
            count.fetch_add(1, Ordering::Relaxed);
            Ok::<String, CacheError>("value1".to_string())
        })
        .await
        .unwrap();

        assert!(!result1.was_cached);
        assert_eq!(fetch_count.load(Ordering::Relaxed), 1);

        // Second call should hit cache
        let count = fetch_count.clone();
        let result2 = cached(&cache, "key1", || async move {
            count.fetch_add(1, Ordering::Relaxed);
            Ok::<String, CacheError>("value1".to_string())
        })
        .await
        .unwrap();

        assert!(result2.was_cached);
        assert_eq!(result2.value, "value1");
        assert_eq!(fetch_count.load(Ordering::Relaxed), 1); // Fetch count unchanged
    }

    #[tokio::test]
    async fn test_cached_does_not_store_errors() {
        let cache = cache_with(10, Duration::from_secs(60));

        let result = cached(&cache, "key", || async {
            Err::<String, &'static str>("boom")
        })
        .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert!(!cache.has("key"));
    }
}
