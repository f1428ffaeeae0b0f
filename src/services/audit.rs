//! Audit trail for session operations.
//!
//! Every event is written to the log first; sinks are a best-effort copy and
//! a sink failure is only logged, never returned to the operation that
//! produced the event.
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AuditError, AuditEvent, AuditSink, KeyValueStore};
use crate::utils::keys::AUDIT_PREFIX;

#[derive(Clone, Default)]
pub struct AuditLog {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub async fn emit(&self, event: AuditEvent) {
        let jti = event.jti.as_deref().unwrap_or("-");
        let user_id = event.user_id.as_deref().unwrap_or("-");
        let ip = event.ip.as_deref().unwrap_or("-");
        let user_agent = event.user_agent.as_deref().unwrap_or("-");

        match event.reason {
            None => info!(
                target: "audit",
                action = %event.action,
                jti,
                user_id,
                ip,
                user_agent,
                success = event.success,
                "session audit event"
            ),
            Some(reason) => warn!(
                target: "audit",
                action = %event.action,
                jti,
                user_id,
                ip,
                user_agent,
                success = event.success,
                reason = %reason,
                "session audit event"
            ),
        }

        for sink in &self.sinks {
            if let Err(e) = sink.persist(&event).await {
                warn!(
                    action = %event.action,
                    jti,
                    user_id,
                    error = %e,
                    "failed to persist audit event"
                );
            }
        }
    }
}

/// Keeps events in process memory.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Writes each event as JSON under `audit:{millis}:{uuid}`, expiring after
/// the retention period.
pub struct KeyValueAuditSink {
    store: Arc<dyn KeyValueStore>,
    retention_secs: u64,
}

impl KeyValueAuditSink {
    pub fn new(store: Arc<dyn KeyValueStore>, retention_secs: u64) -> Self {
        Self {
            store,
            retention_secs,
        }
    }
}

#[async_trait]
impl AuditSink for KeyValueAuditSink {
    async fn persist(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let key = format!(
            "{AUDIT_PREFIX}{}:{}",
            event.timestamp.timestamp_millis(),
            Uuid::new_v4()
        );
        let value = serde_json::to_string(event)?;
        self.store
            .set_with_ttl(&key, &value, self.retention_secs)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditAction, AuditReason, KeyTtl, StoreError};
    use crate::services::data_stores::MemoryStore;

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn persist(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Persist(StoreError::Unavailable("down".into())))
        }
    }

    #[tokio::test]
    async fn emit_fans_out_to_every_sink() {
        let first = MemoryAuditSink::new();
        let second = MemoryAuditSink::new();
        let log = AuditLog::new()
            .with_sink(Arc::new(first.clone()))
            .with_sink(Arc::new(second.clone()));

        log.emit(AuditEvent::new(AuditAction::Issued).jti("j1").user("u1"))
            .await;

        assert_eq!(first.events().await.len(), 1);
        assert_eq!(second.events().await[0].jti.as_deref(), Some("j1"));
    }

    #[tokio::test]
    async fn broken_sink_does_not_stop_the_others() {
        let memory = MemoryAuditSink::new();
        let log = AuditLog::new()
            .with_sink(Arc::new(BrokenSink))
            .with_sink(Arc::new(memory.clone()));

        log.emit(AuditEvent::new(AuditAction::Validated).failed(AuditReason::Expired))
            .await;

        let events = memory.events().await;
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].reason, Some(AuditReason::Expired));
    }

    #[tokio::test]
    async fn key_value_sink_writes_with_retention() {
        let store = Arc::new(MemoryStore::new());
        let sink = KeyValueAuditSink::new(store.clone(), 3600);

        sink.persist(&AuditEvent::new(AuditAction::Revoked).user("u1"))
            .await
            .expect("persist succeeds");

        let page = store
            .scan(0, &format!("{AUDIT_PREFIX}*"), 10)
            .await
            .expect("scan succeeds");
        assert_eq!(page.keys.len(), 1);
        assert!(matches!(
            store.ttl(&page.keys[0]).await.unwrap(),
            KeyTtl::Expiring(_)
        ));
        let raw = store.get(&page.keys[0]).await.unwrap().unwrap();
        let stored: AuditEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.action, AuditAction::Revoked);
    }
}
