use async_trait::async_trait;

use super::StoreError;
use crate::domain::{SessionDescriptor, SessionMetadata, TokenRecord, TokenStatus};

/// Record of live tokens and their session metadata.
///
/// Whether a shared store backs the registry is decided by which
/// implementation is injected, not by checks at call sites.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Writes the token record set-if-absent plus its metadata.
    ///
    /// `Ok(false)` means the JTI is already taken.
    async fn register(
        &self,
        jti: &str,
        record: &TokenRecord,
        metadata: &SessionMetadata,
        ttl_secs: u64,
    ) -> Result<bool, StoreError>;

    async fn status(&self, jti: &str) -> TokenStatus;

    /// Idempotent. Returns `true` if a live record was removed.
    async fn revoke_one(&self, jti: &str) -> bool;

    /// Best-effort sign-out everywhere; returns the number of token records
    /// removed. Tokens issued while the scan runs may be missed.
    async fn revoke_all_for_user(&self, user_id: &str) -> usize;

    async fn list_active_sessions(&self, user_id: &str) -> Vec<SessionDescriptor>;

    /// Removes registry keys that have lost their TTL.
    async fn sweep_orphans(&self) -> Result<usize, StoreError>;
}
