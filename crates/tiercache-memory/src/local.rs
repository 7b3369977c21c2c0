//! Bounded local tier backed by `moka`.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tiercache_core::{CacheKey, CacheValue, LocalTier, LocalTierFactory};

/// Default maximum number of entries per local tier.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Default time-to-live for locally cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Capacity and expiry options for a local tier.
#[derive(Debug, Clone)]
pub struct LocalTierOptions {
    /// Maximum number of entries before the least useful ones are evicted.
    pub max_entries: u64,
    /// Expire entries this long after they were written.
    pub time_to_live: Duration,
    /// Expire entries this long after they were last read, if set.
    pub time_to_idle: Option<Duration>,
}

impl Default for LocalTierOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            time_to_live: DEFAULT_TTL,
            time_to_idle: None,
        }
    }
}

impl LocalTierOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    /// Set the time-to-idle.
    pub fn with_tti(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// A capacity- and TTL-bounded in-process tier.
///
/// Eviction (TinyLFU admission, LRU eviction) and expiry are handled by moka;
/// the orchestrator only sees get/put/evict/clear.
pub struct MokaLocalTier {
    name: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl MokaLocalTier {
    pub fn new(name: impl Into<String>, options: &LocalTierOptions) -> Self {
        let name = name.into();
        let mut builder = Cache::builder()
            .name(&name)
            .max_capacity(options.max_entries)
            .time_to_live(options.time_to_live);
        if let Some(tti) = options.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            name,
            cache: builder.build(),
        }
    }

    /// Apply pending evictions and expirations immediately.
    ///
    /// moka performs housekeeping lazily; tests and stats snapshots call this
    /// to get an exact entry count.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl LocalTier for MokaLocalTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.get(key)
    }

    fn put(&self, key: &CacheKey, value: CacheValue) {
        self.cache.insert(key.clone(), value);
    }

    fn evict(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    fn clear(&self) {
        self.cache.invalidate_all();
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// Creates one [`MokaLocalTier`] per cache name, all with the same options.
#[derive(Debug, Clone, Default)]
pub struct MokaLocalTierFactory {
    options: LocalTierOptions,
}

impl MokaLocalTierFactory {
    pub fn new(options: LocalTierOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LocalTierOptions {
        &self.options
    }
}

impl LocalTierFactory for MokaLocalTierFactory {
    fn create(&self, cache_name: &str) -> Arc<dyn LocalTier> {
        tracing::debug!(
            cache = %cache_name,
            max_entries = self.options.max_entries,
            ttl_secs = self.options.time_to_live.as_secs(),
            "creating local tier"
        );
        Arc::new(MokaLocalTier::new(cache_name, &self.options))
    }

    fn backend_name(&self) -> &'static str {
        "moka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(bytes: &[u8]) -> CacheValue {
        CacheValue::from(bytes)
    }

    #[test]
    fn test_put_get_evict() {
        let tier = MokaLocalTier::new("users", &LocalTierOptions::default());
        let key = CacheKey::from("u:1");

        assert!(tier.get(&key).is_none());
        tier.put(&key, value(b"alice"));
        assert_eq!(tier.get(&key), Some(value(b"alice")));

        tier.evict(&key);
        assert!(tier.get(&key).is_none());
        assert_eq!(tier.name(), "users");
    }

    #[test]
    fn test_clear_removes_everything() {
        let tier = MokaLocalTier::new("users", &LocalTierOptions::default());
        for i in 0..5u64 {
            tier.put(&CacheKey::from(i), value(b"v"));
        }
        tier.clear();
        for i in 0..5u64 {
            assert!(tier.get(&CacheKey::from(i)).is_none());
        }
        tier.run_pending_tasks();
        assert_eq!(tier.entry_count(), 0);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let options = LocalTierOptions::new().with_max_entries(10);
        let tier = MokaLocalTier::new("bounded", &options);
        for i in 0..200u64 {
            tier.put(&CacheKey::from(i), value(b"v"));
        }
        tier.run_pending_tasks();
        assert!(tier.entry_count() <= 10);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let options = LocalTierOptions::new().with_ttl(Duration::from_millis(50));
        let tier = MokaLocalTier::new("short", &options);
        let key = CacheKey::from("k");
        tier.put(&key, value(b"v"));
        assert!(tier.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(120));
        assert!(tier.get(&key).is_none());
    }

    #[test]
    fn test_factory_creates_independent_tiers() {
        let factory = MokaLocalTierFactory::default();
        let a = factory.create("a");
        let b = factory.create("b");
        let key = CacheKey::from("shared-key");

        a.put(&key, value(b"from-a"));
        assert!(b.get(&key).is_none());
        assert_eq!(factory.backend_name(), "moka");
    }
}
