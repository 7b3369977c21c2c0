//! Name → tiered cache registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tiercache_core::{LocalTierFactory, RemoteTierFactory};

use crate::observer::{CacheObserver, TracingObserver};
use crate::tiered::{TieredCache, TieredCacheSettings};

/// Lazily builds one [`TieredCache`] per cache name.
///
/// The first request for a name pairs a local tier and a remote tier created
/// for that name; every later request returns the same instance. Caches live
/// as long as the registry.
pub struct TieredCacheRegistry {
    local_factory: Arc<dyn LocalTierFactory>,
    remote_factory: Arc<dyn RemoteTierFactory>,
    settings: TieredCacheSettings,
    observer: Arc<dyn CacheObserver>,
    caches: DashMap<String, TieredCache>,
}

impl TieredCacheRegistry {
    pub fn new(
        local_factory: Arc<dyn LocalTierFactory>,
        remote_factory: Arc<dyn RemoteTierFactory>,
    ) -> Self {
        Self {
            local_factory,
            remote_factory,
            settings: TieredCacheSettings::default(),
            observer: Arc::new(TracingObserver),
            caches: DashMap::new(),
        }
    }

    /// Settings applied to caches created after this call.
    pub fn with_settings(mut self, settings: TieredCacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Observer attached to caches created after this call.
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the cache for `name`, creating it on first use.
    ///
    /// Creation happens exactly once per name, even when several tasks ask for
    /// a new name at the same time.
    pub fn get_cache(&self, name: &str) -> TieredCache {
        if let Some(cache) = self.caches.get(name) {
            return cache.clone();
        }

        self.caches
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(
                    cache = %name,
                    local = self.local_factory.backend_name(),
                    remote = self.remote_factory.backend_name(),
                    "creating tiered cache"
                );
                TieredCache::with_config(
                    name,
                    self.local_factory.create(name),
                    self.remote_factory.create(name),
                    self.settings.clone(),
                    Arc::clone(&self.observer),
                )
            })
            .clone()
    }

    /// Names of every cache created so far.
    pub fn cache_names(&self) -> BTreeSet<String> {
        self.caches.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of caches created so far.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn remote_backend(&self) -> &'static str {
        self.remote_factory.backend_name()
    }
}

impl std::fmt::Debug for TieredCacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheRegistry")
            .field("local", &self.local_factory.backend_name())
            .field("remote", &self.remote_factory.backend_name())
            .field("caches", &self.cache_names())
            .finish()
    }
}
