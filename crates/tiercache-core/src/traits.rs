//! Tier traits consumed by the orchestrator.
//!
//! A tiered cache pairs one [`LocalTier`] with one [`RemoteTier`] per cache
//! name. Implementations must be thread-safe (`Send + Sync`): the orchestrator
//! shares a single tier instance between all of its callers and never takes a
//! caller-side lock around tier calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TierError;
use crate::types::{CacheKey, CacheValue};

/// A bounded, process-local tier.
///
/// Local tiers are synchronous and infallible: they live in the same process
/// and are expected to answer in microseconds. Capacity and expiry policy are
/// entirely up to the implementation.
pub trait LocalTier: Send + Sync {
    /// Name of the cache this tier serves.
    fn name(&self) -> &str;

    /// Returns the value for `key`, or `None` if absent or expired.
    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &CacheKey, value: CacheValue);

    /// Removes `key` if present.
    fn evict(&self, key: &CacheKey);

    /// Removes every entry.
    fn clear(&self);

    /// Approximate number of live entries.
    fn entry_count(&self) -> u64 {
        0
    }
}

/// A shared, networked tier.
///
/// Every call may fail with a [`TierError`]. A failure is an "operation
/// failed" event and must never be reported as `Ok(None)`: callers rely on the
/// distinction to tell a missing key from an unreachable store.
///
/// # Example
///
/// ```ignore
/// async fn read(tier: &dyn RemoteTier, key: &CacheKey) -> Option<CacheValue> {
///     match tier.get(key).await {
///         Ok(value) => value,
///         Err(e) => {
///             tracing::warn!(error = %e, "remote read failed");
///             None
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// Name of the cache this tier serves.
    fn name(&self) -> &str;

    /// Returns the value for `key`, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing keys.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, TierError>;

    /// Stores `value` under `key` with the tier's own TTL.
    async fn put(&self, key: &CacheKey, value: &CacheValue) -> Result<(), TierError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn evict(&self, key: &CacheKey) -> Result<(), TierError>;

    /// Removes every entry belonging to this tier's cache name.
    async fn clear(&self) -> Result<(), TierError>;

    /// Checks that the backing store is reachable.
    async fn ping(&self) -> Result<(), TierError> {
        Ok(())
    }

    /// Returns the name of this tier backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Creates local tiers scoped to a cache name.
pub trait LocalTierFactory: Send + Sync {
    fn create(&self, cache_name: &str) -> Arc<dyn LocalTier>;

    /// Returns the name of the backend this factory produces.
    fn backend_name(&self) -> &'static str;
}

/// Creates remote tiers scoped to a cache name.
pub trait RemoteTierFactory: Send + Sync {
    fn create(&self, cache_name: &str) -> Arc<dyn RemoteTier>;

    /// Returns the name of the backend this factory produces.
    fn backend_name(&self) -> &'static str;
}
