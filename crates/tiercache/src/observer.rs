//! Instrumentation hooks for tiered caches.
//!
//! The orchestrator reports every hit, miss, tier latency, failure and loader
//! run to a [`CacheObserver`]. Observers are called inline on the caller's
//! task, so implementations must be cheap and must not block.

use std::sync::Arc;
use std::time::Duration;

use tiercache_core::{CacheError, CacheKey, ErrorCategory, TierKind, TierOp};

use crate::metrics;

/// Receives cache events. Every method defaults to a no-op.
pub trait CacheObserver: Send + Sync {
    /// A read was answered by `tier`.
    fn on_hit(&self, _cache: &str, _key: &CacheKey, _tier: TierKind) {}

    /// A read found the key in neither tier.
    fn on_miss(&self, _cache: &str, _key: &CacheKey) {}

    /// A tier call completed, successfully or not.
    fn on_latency(&self, _cache: &str, _tier: TierKind, _operation: TierOp, _elapsed: Duration) {}

    /// A tier call took longer than the configured threshold.
    fn on_slow_operation(
        &self,
        _cache: &str,
        _tier: TierKind,
        _operation: TierOp,
        _elapsed: Duration,
        _threshold: Duration,
    ) {
    }

    /// A tier failed or a load failed.
    fn on_error(&self, _cache: &str, _error: &CacheError) {}

    /// A loader finished.
    fn on_load(&self, _cache: &str, _key: &CacheKey, _elapsed: Duration, _succeeded: bool) {}
}

/// Default observer: structured `tracing` events plus Prometheus series.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn on_hit(&self, cache: &str, key: &CacheKey, tier: TierKind) {
        tracing::debug!(cache = %cache, key = %key, tier = %tier, "cache hit");
        metrics::record_hit(cache, tier);
    }

    fn on_miss(&self, cache: &str, key: &CacheKey) {
        tracing::debug!(cache = %cache, key = %key, "cache miss");
        metrics::record_miss(cache);
    }

    fn on_latency(&self, cache: &str, tier: TierKind, operation: TierOp, elapsed: Duration) {
        metrics::record_operation_duration(cache, tier, operation, elapsed);
    }

    fn on_slow_operation(
        &self,
        cache: &str,
        tier: TierKind,
        operation: TierOp,
        elapsed: Duration,
        threshold: Duration,
    ) {
        tracing::warn!(
            cache = %cache,
            tier = %tier,
            operation = %operation,
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_ms = threshold.as_millis() as u64,
            "slow cache operation"
        );
        metrics::record_slow_operation(cache, tier, operation);
    }

    fn on_error(&self, cache: &str, error: &CacheError) {
        match error {
            CacheError::TierUnavailable {
                tier, operation, ..
            } => {
                tracing::warn!(
                    cache = %cache,
                    tier = %tier,
                    operation = %operation,
                    error = %error,
                    "tier call failed, continuing without it"
                );
                metrics::record_tier_failure(cache, *tier, *operation);
            }
            other => match other.category() {
                ErrorCategory::Internal => {
                    tracing::error!(cache = %cache, error = %other, "cache error");
                }
                _ => {
                    tracing::warn!(cache = %cache, key = ?other.key(), error = %other, "cache error");
                }
            },
        }
    }

    fn on_load(&self, cache: &str, key: &CacheKey, elapsed: Duration, succeeded: bool) {
        tracing::debug!(
            cache = %cache,
            key = %key,
            elapsed_ms = elapsed.as_millis() as u64,
            succeeded,
            "loader finished"
        );
        metrics::record_load(cache, succeeded);
    }
}

/// Forwards every event to each wrapped observer in order.
pub struct CompositeObserver {
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn CacheObserver>>) -> Self {
        Self { observers }
    }
}

impl CacheObserver for CompositeObserver {
    fn on_hit(&self, cache: &str, key: &CacheKey, tier: TierKind) {
        for o in &self.observers {
            o.on_hit(cache, key, tier);
        }
    }

    fn on_miss(&self, cache: &str, key: &CacheKey) {
        for o in &self.observers {
            o.on_miss(cache, key);
        }
    }

    fn on_latency(&self, cache: &str, tier: TierKind, operation: TierOp, elapsed: Duration) {
        for o in &self.observers {
            o.on_latency(cache, tier, operation, elapsed);
        }
    }

    fn on_slow_operation(
        &self,
        cache: &str,
        tier: TierKind,
        operation: TierOp,
        elapsed: Duration,
        threshold: Duration,
    ) {
        for o in &self.observers {
            o.on_slow_operation(cache, tier, operation, elapsed, threshold);
        }
    }

    fn on_error(&self, cache: &str, error: &CacheError) {
        for o in &self.observers {
            o.on_error(cache, error);
        }
    }

    fn on_load(&self, cache: &str, key: &CacheKey, elapsed: Duration, succeeded: bool) {
        for o in &self.observers {
            o.on_load(cache, key, elapsed, succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tiercache_core::TierError;

    #[derive(Default)]
    struct Counting {
        errors: AtomicUsize,
    }

    impl CacheObserver for Counting {
        fn on_error(&self, _cache: &str, _error: &CacheError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_composite_forwards_to_all() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let composite = CompositeObserver::new(vec![
            a.clone() as Arc<dyn CacheObserver>,
            b.clone() as Arc<dyn CacheObserver>,
            Arc::new(TracingObserver) as Arc<dyn CacheObserver>,
        ]);

        let error = CacheError::tier_unavailable(
            "users",
            TierKind::Remote,
            TierOp::Get,
            TierError::connection("refused"),
        );
        composite.on_error("users", &error);
        composite.on_hit("users", &CacheKey::from("1"), TierKind::Local);

        assert_eq!(a.errors.load(Ordering::SeqCst), 1);
        assert_eq!(b.errors.load(Ordering::SeqCst), 1);
    }
}
