//! In-process stand-ins for the remote tier.
//!
//! - [`InMemoryRemoteTier`]: DashMap-backed store with its own TTL. The factory
//!   hands out one tier per cache name, so every registry built from the same
//!   factory sees the same data, just like processes sharing a Redis instance.
//! - [`DisabledRemoteTier`]: always absent, never fails. Used for local-only
//!   deployments.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tiercache_core::{CacheKey, CacheValue, RemoteTier, RemoteTierFactory, TierError};

/// A stored value with TTL support.
#[derive(Clone, Debug)]
struct StoredEntry {
    value: CacheValue,
    stored_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn new(value: CacheValue, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// Shared in-memory tier for one cache name.
pub struct InMemoryRemoteTier {
    name: String,
    entries: DashMap<CacheKey, StoredEntry>,
    ttl: Duration,
}

impl InMemoryRemoteTier {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Number of stored entries, including ones that expired but were not yet
    /// read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RemoteTier for InMemoryRemoteTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, TierError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
            // Remove expired entry
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(None)
    }

    async fn put(&self, key: &CacheKey, value: &CacheValue) -> Result<(), TierError> {
        self.entries
            .insert(key.clone(), StoredEntry::new(value.clone(), self.ttl));
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), TierError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.entries.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Hands out one shared [`InMemoryRemoteTier`] per cache name.
#[derive(Clone)]
pub struct InMemoryRemoteTierFactory {
    tiers: Arc<DashMap<String, Arc<InMemoryRemoteTier>>>,
    ttl: Duration,
}

impl InMemoryRemoteTierFactory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tiers: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Returns the concrete tier for `cache_name`, creating it if needed.
    pub fn tier(&self, cache_name: &str) -> Arc<InMemoryRemoteTier> {
        self.tiers
            .entry(cache_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryRemoteTier::new(cache_name, self.ttl)))
            .clone()
    }
}

impl Default for InMemoryRemoteTierFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

impl RemoteTierFactory for InMemoryRemoteTierFactory {
    fn create(&self, cache_name: &str) -> Arc<dyn RemoteTier> {
        self.tier(cache_name)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Remote tier used when no shared store is configured.
pub struct DisabledRemoteTier {
    name: String,
}

impl DisabledRemoteTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl RemoteTier for DisabledRemoteTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheValue>, TierError> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _value: &CacheValue) -> Result<(), TierError> {
        Ok(())
    }

    async fn evict(&self, _key: &CacheKey) -> Result<(), TierError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}

/// Factory for [`DisabledRemoteTier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemoteTierFactory;

impl RemoteTierFactory for DisabledRemoteTierFactory {
    fn create(&self, cache_name: &str) -> Arc<dyn RemoteTier> {
        Arc::new(DisabledRemoteTier::new(cache_name))
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}
