//! In-memory TTL cache for scan results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use peat_core::constants::{
    EPHEMERAL_EVICTION_FRACTION, EPHEMERAL_MAX_ENTRIES, EPHEMERAL_SWEEP_INTERVAL_SECS,
    EPHEMERAL_TTL_SECS,
};
use peat_core::types::{CacheSource, Identity, ScanKey, ScanResult};

/// Cache entry with absolute expiry.
#[derive(Clone)]
struct CacheEntry {
    result: ScanResult,
    created_at: DateTime<Utc>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Entry lifetime in seconds
    pub ttl_seconds: u64,
    /// Interval between background sweeps in seconds
    pub sweep_interval_seconds: u64,
    /// Share of entries evicted when the cache is full
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: EPHEMERAL_MAX_ENTRIES,
            ttl_seconds: EPHEMERAL_TTL_SECS,
            sweep_interval_seconds: EPHEMERAL_SWEEP_INTERVAL_SECS,
            eviction_fraction: EPHEMERAL_EVICTION_FRACTION,
        }
    }
}

impl CacheConfig {
    /// Sets the maximum number of entries.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Sets the entry lifetime.
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds.max(1);
        self
    }

    /// Sets the share of entries evicted when the cache is full.
    ///
    /// Clamped to `0.0..=1.0`; at least one entry is always evicted.
    pub fn with_eviction_fraction(mut self, fraction: f64) -> Self {
        self.eviction_fraction = if fraction.is_nan() {
            EPHEMERAL_EVICTION_FRACTION
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self
    }

    /// Entry lifetime as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Number of entries to evict from a cache holding `len` entries.
    fn eviction_count(&self, len: usize) -> usize {
        ((len as f64 * self.eviction_fraction).ceil() as usize).clamp(1, len.max(1))
    }
}

/// Bounded in-memory cache of scan results.
///
/// Thread-safe. Reads never return expired entries but leave them in place;
/// they are removed by [`sweep`](Self::sweep), by eviction, or by a clear.
pub struct EphemeralCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
}

impl EphemeralCache {
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(config.max_entries.min(EPHEMERAL_MAX_ENTRIES))),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets the cached result for an identity.
    ///
    /// The returned copy is stamped as served from memory.
    pub fn get(&self, identity: &Identity) -> Option<ScanResult> {
        let key = ScanKey::derive(identity)?;
        self.get_by_key(&key)
    }

    /// Gets the cached result for a key.
    pub fn get_by_key(&self, key: &ScanKey) -> Option<ScanResult> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries.get(key.as_str()).and_then(|e| {
            if e.is_expired_at(now) {
                None
            } else {
                Some(e.result.served_from(CacheSource::Memory, e.created_at))
            }
        })
    }

    /// Returns true if an unexpired entry exists for the identity.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.get(identity).is_some()
    }

    /// Caches a result with the configured TTL.
    ///
    /// Returns false without touching the cache when the identity has no key,
    /// the result carries an error, or it has no findings.
    pub fn put(&self, identity: &Identity, result: &ScanResult) -> bool {
        self.put_with_ttl(identity, result, self.config.ttl())
    }

    /// Caches a result with a custom TTL.
    pub fn put_with_ttl(&self, identity: &Identity, result: &ScanResult, ttl: Duration) -> bool {
        let Some(key) = ScanKey::derive(identity) else {
            return false;
        };
        if result.error.is_some() {
            debug!(scan_key = %key, "refusing to cache errored result");
            return false;
        }
        if !result.has_findings() {
            debug!(scan_key = %key, "refusing to cache result without findings");
            return false;
        }

        let now = Instant::now();
        let entry = CacheEntry {
            result: result.without_provenance(),
            created_at: Utc::now(),
            expires_at: now + ttl,
        };

        let mut entries = self.entries.write();
        if !entries.contains_key(key.as_str()) && entries.len() >= self.config.max_entries {
            let count = self.config.eviction_count(entries.len());
            let evicted = Self::evict_earliest(&mut entries, count);
            debug!(evicted, remaining = entries.len(), "ephemeral cache full, evicted entries");
        }
        entries.insert(key.as_str().to_string(), entry);
        true
    }

    /// Removes the `count` entries with the earliest expiry.
    fn evict_earliest(entries: &mut HashMap<String, CacheEntry>, count: usize) -> usize {
        let mut by_expiry: Vec<(Instant, String)> = entries
            .iter()
            .map(|(k, e)| (e.expires_at, k.clone()))
            .collect();
        by_expiry.sort_unstable();

        by_expiry
            .into_iter()
            .take(count)
            .filter(|(_, key)| entries.remove(key).is_some())
            .count()
    }

    /// Removes all expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        before - entries.len()
    }

    /// Clears all cached entries, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Returns the number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| e.is_expired_at(now)).count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries: expired,
            valid_entries: entries.len().saturating_sub(expired),
            capacity: self.config.max_entries,
            ttl_seconds: self.config.ttl_seconds,
        }
    }
}

impl Default for EphemeralCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries held, including expired ones not yet swept
    pub total_entries: usize,
    /// Expired entries awaiting a sweep
    pub expired_entries: usize,
    /// Entries that can still be served
    pub valid_entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Entry lifetime in seconds
    pub ttl_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use peat_core::types::UsernameHit;
    use proptest::prelude::*;

    fn user(name: &str) -> Identity {
        Identity::Usernames(vec![name.to_string()])
    }

    fn hit_result(identity: &Identity) -> ScanResult {
        let mut result = ScanResult::new(identity);
        result
            .username_hits
            .push(UsernameHit::new("github.com", "https://github.com/someone"));
        result
    }

    #[test]
    fn test_cache_put_get() {
        let cache = EphemeralCache::new();
        let identity = Identity::email("alice@example.com").unwrap();
        let result = hit_result(&identity);

        assert!(cache.put(&identity, &result));
        let cached = cache.get(&identity).unwrap();
        assert!(cached.meta.cached);
        assert!(cached.meta.cached_at.is_some());
        assert_eq!(cached.meta.cache_source, Some(CacheSource::Memory));
        assert_eq!(cached.username_hits, result.username_hits);
    }

    #[test]
    fn test_cache_key_normalization() {
        let cache = EphemeralCache::new();
        let a = Identity::Usernames(vec!["bob".into(), "amy".into()]);
        let b = Identity::Usernames(vec!["amy".into(), "bob".into()]);
        cache.put(&a, &hit_result(&a));
        assert!(cache.get(&b).is_some());

        let upper = Identity::Email("ALICE@example.com".into());
        let lower = Identity::Email("alice@example.com".into());
        cache.put(&upper, &hit_result(&upper));
        assert!(cache.contains(&lower));
    }

    #[test]
    fn test_cache_miss_and_missing_key() {
        let cache = EphemeralCache::new();
        assert!(cache.get(&user("nobody")).is_none());

        let empty = Identity::Usernames(vec![]);
        assert!(!cache.put(&empty, &hit_result(&user("x"))));
        assert!(cache.get(&empty).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_refuses_error_and_empty_results() {
        let cache = EphemeralCache::new();
        let identity = user("alice");

        let empty = ScanResult::new(&identity);
        assert!(!cache.put(&identity, &empty));

        let mut errored = hit_result(&identity);
        errored.error = Some("scan failed".into());
        assert!(!cache.put(&identity, &errored));

        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_ttl_expiration_is_lazy() {
        let cache = EphemeralCache::new();
        let identity = user("alice");
        cache.put_with_ttl(&identity, &hit_result(&identity), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get(&identity).is_none());
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 0);
    }

    #[test]
    fn test_cache_sweep() {
        let cache = EphemeralCache::new();
        let old = user("old");
        let fresh = user("fresh");
        cache.put_with_ttl(&old, &hit_result(&old), Duration::from_millis(1));
        cache.put(&fresh, &hit_result(&fresh));
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fresh).is_some());
    }

    #[test]
    fn test_cache_clear() {
        let cache = EphemeralCache::new();
        for name in ["a1", "a2", "a3"] {
            let identity = user(name);
            cache.put(&identity, &hit_result(&identity));
        }
        assert_eq!(cache.clear(), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_capacity_eviction_order() {
        let cache = EphemeralCache::with_config(CacheConfig::default().with_max_entries(10));
        for i in 0..10 {
            let identity = user(&format!("u{}", i));
            cache.put_with_ttl(&identity, &hit_result(&identity), Duration::from_secs(100 + i));
        }

        let newcomer = user("newcomer");
        cache.put(&newcomer, &hit_result(&newcomer));

        assert_eq!(cache.len(), 10);
        assert!(cache.get(&user("u0")).is_none());
        assert!(cache.get(&user("u1")).is_some());
        assert!(cache.get(&newcomer).is_some());
    }

    #[test]
    fn test_cache_custom_eviction_fraction() {
        let config = CacheConfig::default()
            .with_max_entries(10)
            .with_eviction_fraction(0.5);
        assert_eq!(config.eviction_fraction, 0.5);
        let cache = EphemeralCache::with_config(config);
        for i in 0..10 {
            let identity = user(&format!("u{}", i));
            cache.put_with_ttl(&identity, &hit_result(&identity), Duration::from_secs(100 + i));
        }

        let newcomer = user("newcomer");
        cache.put(&newcomer, &hit_result(&newcomer));

        assert_eq!(cache.len(), 6);
        for i in 0..5 {
            assert!(cache.get(&user(&format!("u{}", i))).is_none());
        }
        assert!(cache.get(&user("u5")).is_some());
        assert!(cache.get(&newcomer).is_some());
    }

    #[test]
    fn test_eviction_fraction_is_clamped() {
        assert_eq!(CacheConfig::default().with_eviction_fraction(3.0).eviction_fraction, 1.0);
        assert_eq!(CacheConfig::default().with_eviction_fraction(-1.0).eviction_fraction, 0.0);
        assert_eq!(
            CacheConfig::default().with_eviction_fraction(f64::NAN).eviction_fraction,
            EPHEMERAL_EVICTION_FRACTION
        );
        // Zero still evicts one entry per overflow.
        assert_eq!(CacheConfig::default().with_eviction_fraction(0.0).eviction_count(10), 1);
    }

    #[test]
    fn test_cache_overwrite_does_not_evict() {
        let cache = EphemeralCache::with_config(CacheConfig::default().with_max_entries(2));
        let a = user("a1");
        let b = user("b1");
        cache.put(&a, &hit_result(&a));
        cache.put(&b, &hit_result(&b));
        cache.put(&a, &hit_result(&a));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_some());
    }

    #[test]
    fn test_cache_stats() {
        let cache = EphemeralCache::new();
        let identity = user("alice");
        cache.put(&identity, &hit_result(&identity));
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.capacity, EPHEMERAL_MAX_ENTRIES);
    }

    proptest! {
        #[test]
        fn prop_eviction_is_bounded_and_earliest_first(
            max in 1usize..40,
            ttls in proptest::collection::vec(10u64..10_000, 1..60),
        ) {
            let cache = EphemeralCache::with_config(CacheConfig::default().with_max_entries(max));
            for (i, ttl) in ttls.iter().enumerate() {
                let identity = user(&format!("u{}", i));
                let before: Vec<(Instant, String)> = {
                    let entries = cache.entries.read();
                    let mut v: Vec<_> = entries.iter().map(|(k, e)| (e.expires_at, k.clone())).collect();
                    v.sort();
                    v
                };

                cache.put_with_ttl(&identity, &hit_result(&identity), Duration::from_secs(*ttl));

                let entries = cache.entries.read();
                let dropped: Vec<&(Instant, String)> =
                    before.iter().filter(|(_, k)| !entries.contains_key(k)).collect();

                let bound = ((before.len() as f64) * 0.1).ceil() as usize;
                prop_assert!(dropped.len() <= bound.max(1));
                prop_assert!(entries.len() <= max);

                // Every dropped entry expires no later than every survivor.
                if let Some(latest_dropped) = dropped.iter().map(|(at, _)| *at).max() {
                    for (at, k) in &before {
                        if entries.contains_key(k) {
                            prop_assert!(*at >= latest_dropped);
                        }
                    }
                }
            }
        }
    }
}
