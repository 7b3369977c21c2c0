pub mod bootstrap;
pub mod config;
mod fence;
mod flight;
pub mod metrics;
pub mod observability;
pub mod observer;
pub mod registry;
pub mod stats;
pub mod tiered;

pub use bootstrap::create_registry;
pub use config::{AppConfig, LocalConfig, RedisConfig, RemoteBackend, RemoteConfig};
pub use flight::LoaderPanicked;
pub use observability::{apply_logging_level, init_tracing};
pub use observer::{CacheObserver, CompositeObserver, TracingObserver};
pub use registry::TieredCacheRegistry;
pub use stats::TieredCacheStats;
pub use tiered::{DEFAULT_SLOW_THRESHOLD, TieredCache, TieredCacheSettings};

pub use tiercache_core::{
    BoxError, CacheEntry, CacheError, CacheKey, CacheResult, CacheValue, ErrorCategory,
    LoadError, LocalTier, LocalTierFactory, RemoteTier, RemoteTierFactory, TierError, TierKind,
    TierOp,
};
