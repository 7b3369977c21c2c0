//! Remote tier implementation on top of a deadpool-redis pool.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, RedisError};
use tiercache_core::{CacheKey, CacheValue, RemoteTier, RemoteTierFactory, TierError};

/// Options shared by every Redis tier created from one factory.
#[derive(Debug, Clone)]
pub struct RedisTierOptions {
    /// Prefix prepended to every namespace, e.g. `"myapp:"`.
    pub key_prefix: String,
    /// TTL applied with `PSETEX`. Zero stores without expiry.
    pub ttl: Duration,
    /// Upper bound for a single command including connection checkout.
    pub op_timeout: Duration,
    /// `COUNT` hint used while scanning during `clear`.
    pub scan_batch: usize,
}

impl Default for RedisTierOptions {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            ttl: Duration::from_secs(600),
            op_timeout: Duration::from_millis(5000),
            scan_batch: 500,
        }
    }
}

/// Redis-backed shared tier for one cache name.
///
/// ## Key Format
///
/// `{key_prefix}{name_len}:{cache_name}:{key}`, e.g. `5:users:42`
///
/// The byte length of the cache name makes the namespace unambiguous even when
/// names or keys contain `:`. `clear` only removes keys under this namespace,
/// so several caches can share one Redis database.
pub struct RedisRemoteTier {
    name: String,
    namespace: String,
    pool: Pool,
    options: RedisTierOptions,
}

impl RedisRemoteTier {
    pub fn new(pool: Pool, cache_name: impl Into<String>, options: RedisTierOptions) -> Self {
        let name = cache_name.into();
        let namespace = format!("{}{}:{}:", options.key_prefix, name.len(), name);
        Self {
            name,
            namespace,
            pool,
            options,
        }
    }

    /// Returns the Redis key used for `key`.
    pub fn namespaced_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Returns the `SCAN MATCH` pattern covering this tier's namespace.
    pub fn namespace_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.namespace))
    }

    async fn connection(&self) -> Result<Connection, TierError> {
        self.pool
            .get()
            .await
            .map_err(|e| TierError::connection(format!("failed to get Redis connection: {e}")))
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, TierError>
    where
        F: Future<Output = Result<T, TierError>>,
    {
        match tokio::time::timeout(self.options.op_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TierError::timeout(self.options.op_timeout)),
        }
    }
}

#[async_trait]
impl RemoteTier for RedisRemoteTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheValue>, TierError> {
        let redis_key = self.namespaced_key(key);
        self.bounded(async {
            let mut conn = self.connection().await?;
            let data: Option<Vec<u8>> = conn.get(&redis_key).await.map_err(map_redis_error)?;
            Ok(data.map(CacheValue::new))
        })
        .await
    }

    async fn put(&self, key: &CacheKey, value: &CacheValue) -> Result<(), TierError> {
        let redis_key = self.namespaced_key(key);
        let data = value.shared_bytes();
        let expiry = expiry_millis(self.options.ttl);
        self.bounded(async {
            let mut conn = self.connection().await?;
            match expiry {
                Some(millis) => conn
                    .pset_ex::<_, _, ()>(&redis_key, &*data, millis)
                    .await
                    .map_err(map_redis_error),
                None => conn
                    .set::<_, _, ()>(&redis_key, &*data)
                    .await
                    .map_err(map_redis_error),
            }
        })
        .await
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), TierError> {
        let redis_key = self.namespaced_key(key);
        self.bounded(async {
            let mut conn = self.connection().await?;
            conn.del::<_, ()>(&redis_key).await.map_err(map_redis_error)
        })
        .await
    }

    async fn clear(&self) -> Result<(), TierError> {
        let pattern = self.namespace_pattern();
        let removed = self
            .bounded(async {
                let mut conn = self.connection().await?;
                let mut cursor: u64 = 0;
                let mut removed = 0usize;
                loop {
                    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(self.options.scan_batch)
                        .query_async(&mut conn)
                        .await
                        .map_err(map_redis_error)?;

                    if !keys.is_empty() {
                        removed += keys.len();
                        conn.del::<_, ()>(keys).await.map_err(map_redis_error)?;
                    }
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(removed)
            })
            .await?;

        tracing::debug!(cache = %self.name, removed, "redis namespace cleared");
        Ok(())
    }

    async fn ping(&self) -> Result<(), TierError> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            let _pong: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Creates one [`RedisRemoteTier`] per cache name over a shared pool.
#[derive(Clone)]
pub struct RedisTierFactory {
    pool: Pool,
    options: RedisTierOptions,
}

impl RedisTierFactory {
    pub fn new(pool: Pool, options: RedisTierOptions) -> Self {
        Self { pool, options }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl RemoteTierFactory for RedisTierFactory {
    fn create(&self, cache_name: &str) -> Arc<dyn RemoteTier> {
        Arc::new(RedisRemoteTier::new(
            self.pool.clone(),
            cache_name,
            self.options.clone(),
        ))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn map_redis_error(err: RedisError) -> TierError {
    if err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_io_error()
    {
        TierError::connection(err.to_string())
    } else {
        TierError::backend(err.to_string())
    }
}

/// `PSETEX` milliseconds for `ttl`, `None` for no expiry. Sub-millisecond
/// TTLs round up so they never turn into "keep forever".
fn expiry_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
}

/// Escapes Redis glob metacharacters so a namespace matches literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
