//! # tiercache-core
//!
//! Tier abstraction layer for the tiercache orchestrator.
//!
//! This crate defines the traits and types that every cache tier must implement.
//! It does not contain any tier implementations - those are provided by separate
//! crates (`tiercache-memory`, `tiercache-redis`).
//!
//! ## Overview
//!
//! Two tier contracts are consumed by the orchestrator:
//!
//! - [`LocalTier`]: synchronous, in-process, bounded (capacity/TTL) store
//! - [`RemoteTier`]: asynchronous, shared, networked store that may fail
//!
//! Both are created per cache name through [`LocalTierFactory`] and
//! [`RemoteTierFactory`].
//!
//! ## Example
//!
//! ```ignore
//! use tiercache_core::{CacheKey, CacheValue, RemoteTier, TierError};
//!
//! async fn warm(tier: &dyn RemoteTier, id: u64, bytes: Vec<u8>) -> Result<(), TierError> {
//!     tier.put(&CacheKey::from(id), &CacheValue::new(bytes)).await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{BoxError, CacheError, ErrorCategory, LoadError, TierError};
pub use traits::{LocalTier, LocalTierFactory, RemoteTier, RemoteTierFactory};
pub use types::{CacheEntry, CacheKey, CacheValue, TierKind, TierOp};

/// Type alias for a cache facade result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Type alias for a shareable local tier.
pub type DynLocalTier = std::sync::Arc<dyn LocalTier>;

/// Type alias for a shareable remote tier.
pub type DynRemoteTier = std::sync::Arc<dyn RemoteTier>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tiercache_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{BoxError, CacheError, ErrorCategory, LoadError, TierError};
    pub use crate::traits::{LocalTier, LocalTierFactory, RemoteTier, RemoteTierFactory};
    pub use crate::types::{CacheEntry, CacheKey, CacheValue, TierKind, TierOp};
    pub use crate::{CacheResult, DynLocalTier, DynRemoteTier};
}
