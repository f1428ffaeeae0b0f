use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AuditEvent;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to encode audit event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to persist audit event: {0}")]
    Persist(#[from] super::StoreError),
}

/// Secondary destination for audit events, on top of the log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditError>;
}
