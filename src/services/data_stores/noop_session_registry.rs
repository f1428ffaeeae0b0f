use async_trait::async_trait;

use crate::domain::{
    AuditAction, AuditEvent, AuditReason, SessionDescriptor, SessionMetadata, SessionRegistry,
    StoreError, TokenRecord, TokenStatus,
};
use crate::services::AuditLog;

/// Registry used when no shared store is configured.
///
/// Tokens stay cryptographically valid until they expire; revocation is not
/// available and every status check answers `Disabled`.
#[derive(Clone, Default)]
pub struct NoopSessionRegistry {
    audit: AuditLog,
}

impl NoopSessionRegistry {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl SessionRegistry for NoopSessionRegistry {
    async fn register(
        &self,
        _jti: &str,
        _record: &TokenRecord,
        _metadata: &SessionMetadata,
        _ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn status(&self, _jti: &str) -> TokenStatus {
        TokenStatus::Disabled
    }

    async fn revoke_one(&self, jti: &str) -> bool {
        self.audit
            .emit(
                AuditEvent::new(AuditAction::Revoked)
                    .jti(jti)
                    .failed(AuditReason::RegistryDisabled),
            )
            .await;
        false
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> usize {
        self.audit
            .emit(
                AuditEvent::new(AuditAction::Revoked)
                    .user(user_id)
                    .failed(AuditReason::RegistryDisabled),
            )
            .await;
        0
    }

    async fn list_active_sessions(&self, _user_id: &str) -> Vec<SessionDescriptor> {
        Vec::new()
    }

    async fn sweep_orphans(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
