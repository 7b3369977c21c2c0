//! In-process tiers for tiercache.
//!
//! - [`MokaLocalTier`]: the bounded, TTL-limited local tier used in production
//! - [`InMemoryRemoteTier`]: a shared in-process store that stands in for a
//!   networked tier in single-process deployments and tests
//! - [`DisabledRemoteTier`]: local-only mode

mod local;
mod remote;

pub use local::{
    DEFAULT_MAX_ENTRIES, DEFAULT_TTL, LocalTierOptions, MokaLocalTier, MokaLocalTierFactory,
};
pub use remote::{
    DisabledRemoteTier, DisabledRemoteTierFactory, InMemoryRemoteTier, InMemoryRemoteTierFactory,
};
