//! Shared test doubles for tiercache integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tiercache::{
    CacheError, CacheKey, CacheObserver, CacheValue, LocalTier, RemoteTier, TierError, TierKind,
    TierOp, TieredCache, TieredCacheSettings,
};
use tiercache_memory::{LocalTierOptions, MokaLocalTier};

/// Local tier over moka whose reads can block the calling thread after a
/// miss, widening the gap between the local miss and the remote read.
pub struct StallingLocalTier {
    inner: MokaLocalTier,
    miss_stall_ms: AtomicUsize,
}

impl StallingLocalTier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MokaLocalTier::new("test", &LocalTierOptions::default()),
            miss_stall_ms: AtomicUsize::new(0),
        })
    }

    pub fn set_miss_stall(&self, stall: Duration) {
        self.miss_stall_ms
            .store(stall.as_millis() as usize, Ordering::SeqCst);
    }
}

impl LocalTier for StallingLocalTier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.inner.get(key);
        let stall = self.miss_stall_ms.load(Ordering::SeqCst);
        if value.is_none() && stall > 0 {
            std::thread::sleep(Duration::from_millis(stall as u64));
        }
        value
    }

    fn put(&self, key: &CacheKey, value: CacheValue) {
        self.inner.put(key, value);
    }

    fn evict(&self, key: &CacheKey) {
        self.inner.evict(key);
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Remote tier that counts calls, can be switched into failure mode and can
/// delay read replies.
#[derive(Default)]
pub struct RecordingRemoteTier {
    entries: DashMap<CacheKey, CacheValue>,
    failing: AtomicBool,
    read_delay_ms: AtomicUsize,
    write_delay_ms: AtomicUsize,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub evicts: AtomicUsize,
    pub clears: AtomicUsize,
}

impl RecordingRemoteTier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Writes directly into the backing map, bypassing counters.
    pub fn seed(&self, key: impl Into<CacheKey>, value: impl Into<CacheValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn stored(&self, key: impl Into<CacheKey>) -> Option<CacheValue> {
        let key: CacheKey = key.into();
        self.entries.get(&key).map(|v| v.clone())
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), TierError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TierError::connection("remote tier is down"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTier for RecordingRemoteTier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, TierError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        // Read first, then stall: models a reply that is in flight while
        // another caller mutates the store.
        let value = self.entries.get(key).map(|v| v.clone());
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        Ok(value)
    }

    async fn put(&self, key: &CacheKey, value: &CacheValue) -> Result<(), TierError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.entries.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), TierError> {
        self.evicts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), TierError> {
        self.check()
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// One observed event, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Hit(TierKind),
    Miss,
    Slow(TierKind, TierOp),
    TierFailure(TierOp),
    LoadFailure,
    Load { succeeded: bool },
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl CacheObserver for RecordingObserver {
    fn on_hit(&self, _cache: &str, _key: &CacheKey, tier: TierKind) {
        self.push(Event::Hit(tier));
    }

    fn on_miss(&self, _cache: &str, _key: &CacheKey) {
        self.push(Event::Miss);
    }

    fn on_slow_operation(
        &self,
        _cache: &str,
        tier: TierKind,
        operation: TierOp,
        _elapsed: Duration,
        _threshold: Duration,
    ) {
        self.push(Event::Slow(tier, operation));
    }

    fn on_error(&self, _cache: &str, error: &CacheError) {
        match error {
            CacheError::TierUnavailable { operation, .. } => {
                self.push(Event::TierFailure(*operation))
            }
            CacheError::LoadFailure { .. } => self.push(Event::LoadFailure),
            _ => {}
        }
    }

    fn on_load(&self, _cache: &str, _key: &CacheKey, _elapsed: Duration, succeeded: bool) {
        self.push(Event::Load { succeeded });
    }
}

/// A cache wired to test doubles, with handles to each of them.
pub struct Harness {
    pub cache: TieredCache,
    pub local: Arc<StallingLocalTier>,
    pub remote: Arc<RecordingRemoteTier>,
    pub observer: Arc<RecordingObserver>,
}

pub fn harness() -> Harness {
    harness_with(TieredCacheSettings::default())
}

pub fn harness_with(settings: TieredCacheSettings) -> Harness {
    let local = StallingLocalTier::new();
    let remote = RecordingRemoteTier::new();
    let observer = RecordingObserver::new();
    let cache = TieredCache::with_config(
        "test",
        local.clone(),
        remote.clone(),
        settings,
        observer.clone(),
    );
    Harness {
        cache,
        local,
        remote,
        observer,
    }
}

pub fn bytes(s: &str) -> CacheValue {
    CacheValue::new(s.as_bytes().to_vec())
}
