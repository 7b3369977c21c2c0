//! Error types for tier calls and the cache facade.
//!
//! [`TierError`] is what a single tier reports. [`CacheError`] is what the
//! orchestrator reports to callers and observers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{CacheKey, TierKind, TierOp};

/// Boxed error produced by a caller-supplied loader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loader error shared between every caller that joined the same load.
pub type LoadError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors that a tier call can fail with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TierError {
    /// The backing store could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The call did not complete in time.
    #[error("Timed out after {elapsed_ms}ms")]
    Timeout {
        /// How long the call ran before it was abandoned.
        elapsed_ms: u64,
    },

    /// The backing store rejected the call.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend error.
        message: String,
    },
}

impl TierError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors surfaced by the tiered cache facade.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A tier call failed. Never fatal: reads treat the tier as absent and
    /// writes skip it.
    #[error("{tier} tier unavailable for cache '{cache}' during {operation}: {source}")]
    TierUnavailable {
        /// Name of the cache whose tier failed.
        cache: String,
        /// Which tier failed.
        tier: TierKind,
        /// The operation that failed.
        operation: TierOp,
        /// The underlying tier error.
        #[source]
        source: TierError,
    },

    /// The caller-supplied loader failed; nothing was cached.
    #[error("Failed to load value for key '{key}': {source}")]
    LoadFailure {
        /// The key being loaded.
        key: CacheKey,
        /// The loader's error.
        #[source]
        source: LoadError,
    },

    /// A stored value could not be decoded as the requested type.
    #[error("Malformed value for key '{key}': {message}")]
    MalformedValue {
        /// The key whose value was malformed.
        key: CacheKey,
        /// Description of the decoding failure.
        message: String,
    },

    /// A value could not be encoded for storage.
    #[error("Failed to encode value for key '{key}': {message}")]
    Serialization {
        /// The key being written.
        key: CacheKey,
        /// Description of the encoding failure.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `TierUnavailable` error.
    #[must_use]
    pub fn tier_unavailable(
        cache: impl Into<String>,
        tier: TierKind,
        operation: TierOp,
        source: TierError,
    ) -> Self {
        Self::TierUnavailable {
            cache: cache.into(),
            tier,
            operation,
            source,
        }
    }

    /// Creates a new `LoadFailure` error.
    #[must_use]
    pub fn load_failure(key: impl Into<CacheKey>, source: LoadError) -> Self {
        Self::LoadFailure {
            key: key.into(),
            source,
        }
    }

    /// Creates a new `MalformedValue` error.
    #[must_use]
    pub fn malformed_value(key: impl Into<CacheKey>, message: impl Into<String>) -> Self {
        Self::MalformedValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(key: impl Into<CacheKey>, message: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a tier failure.
    #[must_use]
    pub fn is_tier_unavailable(&self) -> bool {
        matches!(self, Self::TierUnavailable { .. })
    }

    /// Returns `true` if this is a loader failure.
    #[must_use]
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::LoadFailure { .. })
    }

    /// Returns `true` if this is a malformed value error.
    #[must_use]
    pub fn is_malformed_value(&self) -> bool {
        matches!(self, Self::MalformedValue { .. })
    }

    /// Returns the key this error concerns, if any.
    #[must_use]
    pub fn key(&self) -> Option<&CacheKey> {
        match self {
            Self::TierUnavailable { .. } => None,
            Self::LoadFailure { key, .. }
            | Self::MalformedValue { key, .. }
            | Self::Serialization { key, .. } => Some(key),
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TierUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::LoadFailure { .. } => ErrorCategory::Load,
            Self::MalformedValue { .. } => ErrorCategory::Validation,
            Self::Serialization { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Tier connectivity/timeout/backend error.
    Infrastructure,
    /// Loader error.
    Load,
    /// Stored data did not match the requested type.
    Validation,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Load => write!(f, "load"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
