use async_trait::async_trait;

use super::StoreError;

/// Remaining lifetime of a key as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expiring(u64),
}

impl KeyTtl {
    /// Maps the Redis `TTL` reply (-2 missing, -1 no expiry).
    pub fn from_redis(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            r if r < 0 => KeyTtl::Persistent,
            r => KeyTtl::Expiring(r as u64),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Zero once the iteration is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Networked, TTL-capable key-value store shared by every instance.
///
/// Implementations must give per-key atomicity for `set_nx_with_ttl` and
/// `incr`; nothing else is relied upon for correctness.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Returns `false` when the key already existed and nothing was written.
    async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns `true` when a key was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// One bounded step of a cursor scan. Start with cursor `0`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StoreError>;
}
