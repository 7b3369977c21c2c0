//! Redis-backed remote tier for tiercache.
//!
//! Values are stored as raw bytes under `{prefix}{cache}::{key}` with a
//! per-factory TTL. Every call is bounded by an operation timeout so a slow or
//! unreachable Redis degrades into a tier failure instead of a stalled caller.

mod pool;
mod tier;

pub use pool::create_pool;
pub use tier::{RedisRemoteTier, RedisTierFactory, RedisTierOptions};
