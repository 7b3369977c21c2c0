//! Connection pool setup.

use std::time::Duration;

use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tiercache_core::TierError;

/// Creates a deadpool-redis pool for `url`.
///
/// The pool connects lazily, so this succeeds even when Redis is down. Use
/// [`RemoteTier::ping`](tiercache_core::RemoteTier::ping) to check reachability.
///
/// # Errors
///
/// Returns [`TierError::Connection`] if the URL or pool settings are invalid.
pub fn create_pool(url: &str, pool_size: usize, timeout: Duration) -> Result<Pool, TierError> {
    let mut redis_config = Config::from_url(url);
    let mut pool_config = PoolConfig::new(pool_size.max(1));
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    redis_config.pool = Some(pool_config);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| TierError::connection(format!("failed to create Redis pool: {e}")))
}
