use serde::{Deserialize, Serialize};
use std::time::Duration;

use tiercache_memory::LocalTierOptions;
use tiercache_redis::RedisTierOptions;

use crate::tiered::TieredCacheSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Local tier configuration
    #[serde(default)]
    pub local: LocalConfig,
    /// Remote tier configuration
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Redis connection (used when `remote.backend = "redis"`)
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Local tier validations
        if self.local.max_entries == 0 {
            return Err("local.max_entries must be > 0".into());
        }
        if self.local.ttl_secs == 0 {
            return Err("local.ttl_secs must be > 0".into());
        }
        if self.local.idle_secs == Some(0) {
            return Err("local.idle_secs must be > 0 when set".into());
        }
        // Remote tier validations
        if self.remote.ttl_secs == 0 {
            return Err("remote.ttl_secs must be > 0".into());
        }
        if self.remote.backend == RemoteBackend::Redis {
            if self.redis.url.trim().is_empty() {
                return Err("redis.url is required when remote.backend = \"redis\"".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn local_tier_options(&self) -> LocalTierOptions {
        let mut options = LocalTierOptions::new()
            .with_max_entries(self.local.max_entries)
            .with_ttl(Duration::from_secs(self.local.ttl_secs));
        if let Some(idle) = self.local.idle_secs {
            options = options.with_tti(Duration::from_secs(idle));
        }
        options
    }

    pub fn redis_tier_options(&self) -> RedisTierOptions {
        RedisTierOptions {
            key_prefix: self.remote.key_prefix.clone(),
            ttl: Duration::from_secs(self.remote.ttl_secs),
            op_timeout: Duration::from_millis(self.redis.timeout_ms),
            ..Default::default()
        }
    }

    pub fn cache_settings(&self) -> TieredCacheSettings {
        TieredCacheSettings::default()
            .with_slow_threshold(Duration::from_millis(self.latency.warn_threshold_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Local (in-process) tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Maximum entries per cache
    #[serde(default = "default_local_max_entries")]
    pub max_entries: u64,

    /// Time-to-live in seconds
    #[serde(default = "default_local_ttl_secs")]
    pub ttl_secs: u64,

    /// Optional time-to-idle in seconds
    #[serde(default)]
    pub idle_secs: Option<u64>,
}

fn default_local_max_entries() -> u64 {
    10_000
}

fn default_local_ttl_secs() -> u64 {
    300
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            max_entries: default_local_max_entries(),
            ttl_secs: default_local_ttl_secs(),
            idle_secs: None,
        }
    }
}

/// Which shared store backs the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// Redis via deadpool-redis
    #[default]
    Redis,
    /// In-process shared store (single instance deployments, tests)
    Memory,
    /// Local tier only
    None,
}

impl RemoteBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for RemoteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote (shared) tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: RemoteBackend,

    /// Time-to-live in seconds, independent of the local tier's
    #[serde(default = "default_remote_ttl_secs")]
    pub ttl_secs: u64,

    /// Prefix for every remote key, e.g. "myapp:"
    #[serde(default)]
    pub key_prefix: String,
}

fn default_remote_ttl_secs() -> u64 {
    600
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::default(),
            ttl_secs: default_remote_ttl_secs(),
            key_prefix: String::new(),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool and per-command timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Tier calls slower than this are logged at warn level
    #[serde(default = "default_warn_threshold_ms")]
    pub warn_threshold_ms: u64,
}

fn default_warn_threshold_ms() -> u64 {
    10
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            warn_threshold_ms: default_warn_threshold_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder at startup
    #[serde(default)]
    pub enabled: bool,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// File read when no path is given. Its absence is not an error.
    pub const DEFAULT_CONFIG_FILE: &str = "tiercache.toml";

    /// Loads, merges and validates the configuration.
    ///
    /// An explicit `path` must exist; without one, [`DEFAULT_CONFIG_FILE`] is
    /// read if present and defaults apply otherwise.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.is_file() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TIERCACHE__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("TIERCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}
