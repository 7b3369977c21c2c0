//! Key, value and entry types shared by every tier.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

/// Identifier of a cached value, scoped to the cache name that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for CacheKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

macro_rules! impl_key_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CacheKey {
                fn from(id: $ty) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

impl_key_from_integer!(u32, u64, i32, i64, usize);

/// An opaque cached payload.
///
/// The bytes are wrapped in `Arc` so that hits can be handed out and promoted
/// between tiers without copying potentially large payloads. The orchestrator
/// never looks inside; typed helpers encode and decode with MessagePack.
#[derive(Clone, PartialEq, Eq)]
pub struct CacheValue(Arc<Vec<u8>>);

impl CacheValue {
    /// Wraps raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    /// Encodes a serializable value as MessagePack.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(value).map(Self::new)
    }

    /// Decodes the payload as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.0)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns a shared handle to the raw bytes.
    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheValue")
            .field("len", &self.0.len())
            .finish()
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<Arc<Vec<u8>>> for CacheValue {
    fn from(bytes: Arc<Vec<u8>>) -> Self {
        Self(bytes)
    }
}

/// The tier a value was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Process-local, bounded tier.
    Local,
    /// Shared, networked tier.
    Remote,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier operation, used to label latency and failure observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierOp {
    Get,
    Put,
    Evict,
    Clear,
    Ping,
}

impl TierOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Evict => "evict",
            Self::Clear => "clear",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for TierOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value found in one of the tiers, tagged with its tier of origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: CacheValue,
    pub tier: TierKind,
}

impl CacheEntry {
    pub fn new(key: CacheKey, value: CacheValue, tier: TierKind) -> Self {
        Self { key, value, tier }
    }

    /// Returns `true` if the value came from the local tier.
    pub fn is_local_hit(&self) -> bool {
        self.tier == TierKind::Local
    }

    pub fn into_value(self) -> CacheValue {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
        email: String,
    }

    #[test]
    fn test_key_conversions() {
        assert_eq!(CacheKey::from("u:1").as_str(), "u:1");
        assert_eq!(CacheKey::from(42u64).as_str(), "42");
        assert_eq!(CacheKey::from(String::from("abc")), CacheKey::new("abc"));
        assert_eq!(CacheKey::from(-7i64).to_string(), "-7");
    }

    #[test]
    fn test_value_encode_decode() {
        let alice = User {
            id: 1,
            name: "Alice".into(),
            email: "alice@example.com".into(),
        };
        let value = CacheValue::encode(&alice).unwrap();
        assert!(!value.is_empty());
        assert_eq!(value.decode::<User>().unwrap(), alice);
    }

    #[test]
    fn test_value_decode_wrong_type_fails() {
        let value = CacheValue::encode(&"just a string").unwrap();
        assert!(value.decode::<User>().is_err());
    }

    #[test]
    fn test_value_clone_shares_bytes() {
        let value = CacheValue::new(vec![1, 2, 3]);
        let copy = value.clone();
        assert!(Arc::ptr_eq(&value.shared_bytes(), &copy.shared_bytes()));
        assert_eq!(format!("{value:?}"), "CacheValue { len: 3 }");
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!(TierKind::Local.to_string(), "local");
        assert_eq!(TierKind::Remote.to_string(), "remote");
        assert_eq!(TierOp::Evict.to_string(), "evict");
    }

    #[test]
    fn test_entry_origin() {
        let entry = CacheEntry::new("k".into(), CacheValue::new(vec![]), TierKind::Local);
        assert!(entry.is_local_hit());
    }
}
