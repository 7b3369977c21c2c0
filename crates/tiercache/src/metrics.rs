//! Prometheus metrics for tiered caches.
//!
//! Recording functions are cheap no-ops until a recorder is installed, so the
//! library records unconditionally and the application decides whether to
//! call [`init_metrics`].

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use tiercache_core::{TierKind, TierOp};

use crate::stats::TieredCacheStats;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const HITS_TOTAL: &str = "tiercache_hits_total";
    pub const MISSES_TOTAL: &str = "tiercache_misses_total";
    pub const TIER_FAILURES_TOTAL: &str = "tiercache_tier_failures_total";
    pub const OPERATION_DURATION_SECONDS: &str = "tiercache_operation_duration_seconds";
    pub const SLOW_OPERATIONS_TOTAL: &str = "tiercache_slow_operations_total";
    pub const LOADS_TOTAL: &str = "tiercache_loads_total";
    pub const LOCAL_ENTRIES: &str = "tiercache_local_entries";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record a read answered by `tier`.
pub fn record_hit(cache: &str, tier: TierKind) {
    counter!(
        names::HITS_TOTAL,
        "cache" => cache.to_string(),
        "tier" => tier.as_str()
    )
    .increment(1);
}

/// Record a read absent from both tiers.
pub fn record_miss(cache: &str) {
    counter!(names::MISSES_TOTAL, "cache" => cache.to_string()).increment(1);
}

/// Record a failed tier call.
pub fn record_tier_failure(cache: &str, tier: TierKind, operation: TierOp) {
    counter!(
        names::TIER_FAILURES_TOTAL,
        "cache" => cache.to_string(),
        "tier" => tier.as_str(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record how long a tier call took.
pub fn record_operation_duration(cache: &str, tier: TierKind, operation: TierOp, elapsed: Duration) {
    histogram!(
        names::OPERATION_DURATION_SECONDS,
        "cache" => cache.to_string(),
        "tier" => tier.as_str(),
        "operation" => operation.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a tier call slower than the warning threshold.
pub fn record_slow_operation(cache: &str, tier: TierKind, operation: TierOp) {
    counter!(
        names::SLOW_OPERATIONS_TOTAL,
        "cache" => cache.to_string(),
        "tier" => tier.as_str(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

/// Record a loader run.
pub fn record_load(cache: &str, succeeded: bool) {
    let outcome = if succeeded { "success" } else { "failure" };
    counter!(
        names::LOADS_TOTAL,
        "cache" => cache.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish the local entry count from a stats snapshot.
pub fn set_local_entries(stats: &TieredCacheStats) {
    gauge!(names::LOCAL_ENTRIES, "cache" => stats.cache.clone()).set(stats.local_entries as f64);
}
