//! Builds a registry from configuration.

use std::sync::Arc;
use std::time::Duration;

use tiercache_core::RemoteTierFactory;
use tiercache_memory::{DisabledRemoteTierFactory, InMemoryRemoteTierFactory, MokaLocalTierFactory};
use tiercache_redis::{RedisTierFactory, create_pool};

use crate::config::{AppConfig, RemoteBackend};
use crate::registry::TieredCacheRegistry;

/// Creates the registry described by `config`.
///
/// A Redis pool that cannot be created (for example a malformed URL) falls
/// back to local-only mode. A Redis that is merely unreachable at startup is
/// kept: every call against it degrades on its own, and it is used as soon as
/// it comes back.
pub async fn create_registry(config: &AppConfig) -> TieredCacheRegistry {
    let local = Arc::new(MokaLocalTierFactory::new(config.local_tier_options()));
    let remote = create_remote_factory(config).await;

    TieredCacheRegistry::new(local, remote).with_settings(config.cache_settings())
}

async fn create_remote_factory(config: &AppConfig) -> Arc<dyn RemoteTierFactory> {
    match config.remote.backend {
        RemoteBackend::None => {
            tracing::info!("Remote tier disabled, using local tier only");
            Arc::new(DisabledRemoteTierFactory)
        }
        RemoteBackend::Memory => {
            tracing::info!(
                ttl_secs = config.remote.ttl_secs,
                "Using in-process remote tier"
            );
            Arc::new(InMemoryRemoteTierFactory::new(Duration::from_secs(
                config.remote.ttl_secs,
            )))
        }
        RemoteBackend::Redis => create_redis_factory(config).await,
    }
}

async fn create_redis_factory(config: &AppConfig) -> Arc<dyn RemoteTierFactory> {
    let redis = &config.redis;
    let pool = match create_pool(
        &redis.url,
        redis.pool_size,
        Duration::from_millis(redis.timeout_ms),
    ) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                url = %redis.url,
                "Failed to create Redis pool, falling back to local tier only"
            );
            return Arc::new(DisabledRemoteTierFactory);
        }
    };

    let factory = RedisTierFactory::new(pool, config.redis_tier_options());
    // Probe with a throwaway tier; the namespace does not matter for PING.
    match factory.create("__startup_ping").ping().await {
        Ok(()) => {
            tracing::info!(
                url = %redis.url,
                pool_size = redis.pool_size,
                "Redis remote tier connected"
            );
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                url = %redis.url,
                "Redis unreachable at startup, remote tier calls will fail until it recovers"
            );
        }
    }

    Arc::new(factory)
}
