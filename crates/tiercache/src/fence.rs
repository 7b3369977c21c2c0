//! Ordering between promotions and invalidations.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Drops promotions that overlap an invalidation of the same cache.
///
/// Every invalidation (put, evict, clear) bumps the epoch and applies its
/// local-tier change while holding the write gate. A promotion records the
/// epoch before it reads the remote tier and later writes into the local tier
/// under the read gate only if the epoch is unchanged. The gate is held for
/// the duration of a single local-tier call, never across a remote call.
///
/// The epoch is per cache, not per key: an unrelated write can cost a
/// promotion, which only means the next read goes to the remote tier again.
#[derive(Debug, Default)]
pub(crate) struct PromotionFence {
    epoch: AtomicU64,
    gate: RwLock<()>,
}

impl PromotionFence {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current epoch, to be passed to [`promote_if_unchanged`](Self::promote_if_unchanged).
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Runs `promote` if no invalidation happened since `observed` was read.
    pub(crate) fn promote_if_unchanged(&self, observed: u64, promote: impl FnOnce()) -> bool {
        let _guard = self.gate.read();
        if self.epoch.load(Ordering::Acquire) != observed {
            return false;
        }
        promote();
        true
    }

    /// Bumps the epoch and runs `apply` before any pending promotion can land.
    pub(crate) fn invalidate<T>(&self, apply: impl FnOnce() -> T) -> T {
        let _guard = self.gate.write();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        apply()
    }
}
