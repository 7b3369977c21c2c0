//! The tiered cache facade.
//!
//! A [`TieredCache`] pairs one local tier with one remote tier for a single
//! cache name.
//!
//! ## Reads
//!
//! 1. Local tier. A hit returns immediately without touching the remote tier.
//! 2. Remote tier. A hit is promoted into the local tier and returned.
//! 3. Neither: `None`, and neither tier is modified.
//!
//! A failing remote tier is reported to the observer and treated as a miss.
//!
//! ## Writes
//!
//! `put`, `evict` and `clear` apply to the local tier first, then the remote
//! tier. Both are always attempted; a remote failure is reported and skipped.
//!
//! ## Loads
//!
//! `get_or_load` runs at most one loader per key at a time. Concurrent callers
//! for the same key await the same result, including the same error.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tiercache_core::{
    BoxError, CacheEntry, CacheError, CacheKey, CacheValue, DynLocalTier, DynRemoteTier,
    LoadError, LocalTier, TierError, TierKind, TierOp,
};

use crate::fence::PromotionFence;
use crate::flight::{FlightResult, FlightToken, LoaderPanicked, SingleFlight};
use crate::observer::{CacheObserver, TracingObserver};
use crate::stats::{StatsCounters, TieredCacheStats};

/// Default threshold above which a tier call is reported as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(10);

/// Behavior knobs shared by every cache of a registry.
#[derive(Debug, Clone)]
pub struct TieredCacheSettings {
    /// Tier calls slower than this are reported through
    /// [`CacheObserver::on_slow_operation`]. Latency never changes behavior.
    pub slow_threshold: Duration,
}

impl Default for TieredCacheSettings {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }
}

impl TieredCacheSettings {
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }
}

struct Inner {
    name: String,
    local: DynLocalTier,
    remote: DynRemoteTier,
    settings: TieredCacheSettings,
    observer: Arc<dyn CacheObserver>,
    flights: SingleFlight,
    fence: PromotionFence,
    stats: StatsCounters,
}

/// Read-through/write-through cache over a local and a remote tier.
///
/// Cloning is cheap; clones share tiers, in-flight loads and statistics.
///
/// # Example
///
/// ```ignore
/// let cache = registry.get_cache("users");
/// let user: User = cache
///     .get_or_load_as(42u64, || async { db.load_user(42).await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.inner.name)
            .field("remote", &self.inner.remote.backend_name())
            .finish()
    }
}

impl TieredCache {
    /// Creates a cache with default settings and the [`TracingObserver`].
    pub fn new(name: impl Into<String>, local: DynLocalTier, remote: DynRemoteTier) -> Self {
        Self::with_config(
            name,
            local,
            remote,
            TieredCacheSettings::default(),
            Arc::new(TracingObserver),
        )
    }

    pub fn with_config(
        name: impl Into<String>,
        local: DynLocalTier,
        remote: DynRemoteTier,
        settings: TieredCacheSettings,
        observer: Arc<dyn CacheObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                local,
                remote,
                settings,
                observer,
                flights: SingleFlight::new(),
                fence: PromotionFence::new(),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Name of this cache.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the value for `key`, promoting remote hits into the local tier.
    pub async fn get(&self, key: impl Into<CacheKey>) -> Option<CacheValue> {
        let key = key.into();
        self.inner.lookup(&key).await.map(CacheEntry::into_value)
    }

    /// Like [`get`](Self::get), but also reports which tier answered.
    pub async fn lookup(&self, key: impl Into<CacheKey>) -> Option<CacheEntry> {
        let key = key.into();
        self.inner.lookup(&key).await
    }

    /// Returns the value for `key` decoded as `T`.
    ///
    /// # Errors
    ///
    /// [`CacheError::MalformedValue`] if the stored bytes do not decode as `T`.
    pub async fn get_as<T>(&self, key: impl Into<CacheKey>) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let key = key.into();
        match self.inner.lookup(&key).await {
            Some(entry) => decode(&key, &entry.value).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the cached value, or runs `loader`, stores its result in both
    /// tiers and returns it.
    ///
    /// Only one loader per key runs at a time. Callers that arrive while a load
    /// is in progress wait for it and receive its outcome. The load keeps
    /// running if the caller that started it is cancelled while others wait.
    ///
    /// # Errors
    ///
    /// [`CacheError::LoadFailure`] if the loader returns an error or panics.
    /// Nothing is cached and the next call runs the loader again.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        key: impl Into<CacheKey>,
        loader: F,
    ) -> Result<CacheValue, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CacheValue, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let key = key.into();
        if let Some(entry) = self.inner.lookup(&key).await {
            return Ok(entry.into_value());
        }

        let (flight, started) = self.inner.flights.join_or_start(&key, |token| {
            Inner::load(Arc::clone(&self.inner), key.clone(), token, loader)
        });
        if !started {
            tracing::debug!(cache = %self.inner.name, key = %key, "joined in-flight load");
        }

        flight
            .await
            .map_err(|source| CacheError::load_failure(key, source))
    }

    /// Typed [`get_or_load`](Self::get_or_load): the loaded value is stored as
    /// MessagePack and decoded back as `T`.
    ///
    /// # Errors
    ///
    /// [`CacheError::LoadFailure`] if the loader fails or its value cannot be
    /// encoded, [`CacheError::MalformedValue`] if a cached value does not decode
    /// as `T`.
    pub async fn get_or_load_as<T, F, Fut, E>(
        &self,
        key: impl Into<CacheKey>,
        loader: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let key = key.into();
        let encoded = move || async move {
            let value = loader().await.map_err(Into::<BoxError>::into)?;
            let encoded = CacheValue::encode(&value).map_err(BoxError::from)?;
            Ok::<CacheValue, BoxError>(encoded)
        };
        let value = self.get_or_load(key.clone(), encoded).await?;
        decode(&key, &value)
    }

    /// Stores `value` in the local tier, then the remote tier.
    pub async fn put(&self, key: impl Into<CacheKey>, value: impl Into<CacheValue>) {
        let key = key.into();
        self.inner.put(&key, value.into()).await;
    }

    /// Encodes `value` as MessagePack and stores it.
    ///
    /// # Errors
    ///
    /// [`CacheError::Serialization`] if `value` cannot be encoded. Nothing is
    /// written in that case.
    pub async fn put_as<T>(&self, key: impl Into<CacheKey>, value: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let key = key.into();
        let encoded = CacheValue::encode(&value)
            .map_err(|e| CacheError::serialization(key.clone(), e.to_string()))?;
        self.inner.put(&key, encoded).await;
        Ok(())
    }

    /// Removes `key` from both tiers.
    pub async fn evict(&self, key: impl Into<CacheKey>) {
        let key = key.into();
        self.inner.evict(&key).await;
    }

    /// Removes every entry of this cache from both tiers.
    ///
    /// Not atomic across tiers: a read racing with `clear` may still return a
    /// value the remote tier held before it was cleared, but that value is not
    /// promoted into the cleared local tier.
    pub async fn clear(&self) {
        self.inner.clear().await;
    }

    /// Snapshot of this cache's counters.
    pub fn stats(&self) -> TieredCacheStats {
        self.inner.stats.snapshot(
            &self.inner.name,
            self.inner.flights.len(),
            self.inner.local.entry_count(),
        )
    }

    /// Returns `true` if the remote tier answers a ping.
    pub async fn is_remote_available(&self) -> bool {
        self.inner.remote.ping().await.is_ok()
    }

    pub fn local_tier(&self) -> &DynLocalTier {
        &self.inner.local
    }

    pub fn remote_tier(&self) -> &DynRemoteTier {
        &self.inner.remote
    }

    /// Returns `true` if both handles refer to the same cache instance.
    pub fn same_instance(&self, other: &TieredCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Inner {
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        // Taken before the local read: a write landing between the local miss
        // and the remote read must still block the promotion.
        let epoch = self.fence.epoch();
        if let Some(value) = self.local_call(TierOp::Get, |local| local.get(key)) {
            self.stats.record_local_hit();
            self.observer.on_hit(&self.name, key, TierKind::Local);
            return Some(CacheEntry::new(key.clone(), value, TierKind::Local));
        }

        match self.remote_call(TierOp::Get, self.remote.get(key)).await.flatten() {
            Some(value) => {
                let promoted = self.fence.promote_if_unchanged(epoch, || {
                    self.local_call(TierOp::Put, |local| local.put(key, value.clone()));
                });
                if !promoted {
                    tracing::debug!(
                        cache = %self.name,
                        key = %key,
                        "skipped promotion, cache was invalidated during the remote read"
                    );
                }
                self.stats.record_remote_hit();
                self.observer.on_hit(&self.name, key, TierKind::Remote);
                Some(CacheEntry::new(key.clone(), value, TierKind::Remote))
            }
            None => {
                self.stats.record_miss();
                self.observer.on_miss(&self.name, key);
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, value: CacheValue) {
        self.fence.invalidate(|| {
            self.local_call(TierOp::Put, |local| local.put(key, value.clone()));
        });
        self.remote_call(TierOp::Put, self.remote.put(key, &value))
            .await;
    }

    async fn evict(&self, key: &CacheKey) {
        self.fence
            .invalidate(|| self.local_call(TierOp::Evict, |local| local.evict(key)));
        self.remote_call(TierOp::Evict, self.remote.evict(key))
            .await;
        // A read that started after the first step may have promoted the old
        // remote value before the remote evict landed.
        self.fence
            .invalidate(|| self.local_call(TierOp::Evict, |local| local.evict(key)));
    }

    async fn clear(&self) {
        self.fence
            .invalidate(|| self.local_call(TierOp::Clear, |local| local.clear()));
        self.remote_call(TierOp::Clear, self.remote.clear()).await;
        self.fence
            .invalidate(|| self.local_call(TierOp::Clear, |local| local.clear()));
        tracing::debug!(cache = %self.name, "cache cleared");
    }

    /// Builds the flight future for one load.
    fn load<F, Fut, E>(
        inner: Arc<Inner>,
        key: CacheKey,
        token: FlightToken,
        loader: F,
    ) -> BoxFuture<'static, FlightResult>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CacheValue, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        async move {
            let _token = token;
            let started = Instant::now();
            let outcome = AssertUnwindSafe(inner.run_loader(&key, loader))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let panicked: LoadError =
                        Arc::new(LoaderPanicked::from_payload(payload.as_ref()));
                    Err(panicked)
                });

            if let Err(source) = &outcome {
                let elapsed = started.elapsed();
                inner.stats.record_load_failure();
                inner.observer.on_load(&inner.name, &key, elapsed, false);
                inner.observer.on_error(
                    &inner.name,
                    &CacheError::load_failure(key.clone(), Arc::clone(source)),
                );
            }
            outcome
        }
        .boxed()
    }

    async fn run_loader<F, Fut, E>(&self, key: &CacheKey, loader: F) -> FlightResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, E>>,
        E: Into<BoxError>,
    {
        // An earlier flight may have finished between the caller's miss and
        // this flight starting. The caller already counted its lookup.
        if let Some(value) = self.local_call(TierOp::Get, |local| local.get(key)) {
            return Ok(value);
        }

        let started = Instant::now();
        let value = match loader().await {
            Ok(value) => value,
            Err(e) => {
                let boxed: BoxError = e.into();
                return Err(LoadError::from(boxed));
            }
        };
        self.stats.record_load();
        self.observer
            .on_load(&self.name, key, started.elapsed(), true);

        self.put(key, value.clone()).await;
        Ok(value)
    }

    fn local_call<T>(&self, operation: TierOp, call: impl FnOnce(&dyn LocalTier) -> T) -> T {
        let started = Instant::now();
        let result = call(self.local.as_ref());
        self.observe_latency(TierKind::Local, operation, started.elapsed());
        result
    }

    /// Runs a remote call, turning a failure into an observed `None`.
    async fn remote_call<T>(
        &self,
        operation: TierOp,
        call: impl Future<Output = Result<T, TierError>>,
    ) -> Option<T> {
        let started = Instant::now();
        let result = call.await;
        self.observe_latency(TierKind::Remote, operation, started.elapsed());

        match result {
            Ok(value) => Some(value),
            Err(source) => {
                self.stats.record_remote_failure();
                let error =
                    CacheError::tier_unavailable(&self.name, TierKind::Remote, operation, source);
                self.observer.on_error(&self.name, &error);
                None
            }
        }
    }

    fn observe_latency(&self, tier: TierKind, operation: TierOp, elapsed: Duration) {
        self.observer
            .on_latency(&self.name, tier, operation, elapsed);
        let threshold = self.settings.slow_threshold;
        if elapsed > threshold {
            self.stats.record_slow_operation();
            self.observer
                .on_slow_operation(&self.name, tier, operation, elapsed, threshold);
        }
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, value: &CacheValue) -> Result<T, CacheError> {
    value
        .decode()
        .map_err(|e| CacheError::malformed_value(key.clone(), e.to_string()))
}
