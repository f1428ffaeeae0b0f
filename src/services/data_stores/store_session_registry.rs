use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::{
    AuditAction, AuditEvent, AuditReason, KeyTtl, KeyValueStore, ScanPage, SessionDescriptor,
    SessionMetadata, SessionRegistry, StoreError, TokenRecord, TokenStatus,
};
use crate::services::AuditLog;
use crate::utils::keys::{self, META_PREFIX, TOKEN_PREFIX};

/// Registry backed by the shared key-value store.
///
/// Bulk operations walk the namespace with bounded cursor scans, so they are
/// convergent rather than atomic: keys written while a scan is in flight may
/// or may not be visited.
pub struct StoreSessionRegistry {
    store: Arc<dyn KeyValueStore>,
    audit: AuditLog,
    scan_batch: usize,
}

impl StoreSessionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, audit: AuditLog, scan_batch: usize) -> Self {
        Self {
            store,
            audit,
            scan_batch: scan_batch.max(1),
        }
    }

    async fn page(&self, cursor: u64, prefix: &str) -> Result<ScanPage, StoreError> {
        self.store
            .scan(cursor, &format!("{prefix}*"), self.scan_batch)
            .await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    // The token record decides the outcome; leftover metadata expires with
    // its TTL or is picked up by the sweeper.
    async fn delete_pair(&self, jti: &str) -> Result<bool, StoreError> {
        let removed = self.store.delete(&keys::token(jti)).await?;
        if let Err(e) = self.store.delete(&keys::meta(jti)).await {
            warn!(jti, error = %e, action = "revoke", "failed to delete session metadata");
        }
        Ok(removed)
    }

    async fn revoke_matching(&self, user_id: &str, revoked: &mut usize) -> Result<(), StoreError> {
        let mut cursor = 0;
        loop {
            let page = self.page(cursor, TOKEN_PREFIX).await?;
            for key in &page.keys {
                let Some(jti) = key.strip_prefix(TOKEN_PREFIX) else {
                    continue;
                };
                let record = match self.load::<TokenRecord>(key).await {
                    Ok(Some(record)) => record,
                    // expired between scan and read
                    Ok(None) => continue,
                    Err(StoreError::Corrupt(e)) => {
                        warn!(jti, error = %e, "skipping undecodable token record");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if record.user_id == user_id && self.delete_pair(jti).await? {
                    *revoked += 1;
                }
            }
            cursor = page.cursor;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    async fn collect_sessions(
        &self,
        user_id: &str,
        sessions: &mut Vec<SessionDescriptor>,
    ) -> Result<(), StoreError> {
        let mut cursor = 0;
        loop {
            let page = self.page(cursor, META_PREFIX).await?;
            for key in &page.keys {
                let Some(jti) = key.strip_prefix(META_PREFIX) else {
                    continue;
                };
                match self.load::<SessionMetadata>(key).await {
                    Ok(Some(meta)) if meta.user_id == user_id => {
                        sessions.push(SessionDescriptor::from_metadata(jti, meta));
                    }
                    Ok(_) => {}
                    Err(StoreError::Corrupt(e)) => {
                        warn!(jti, error = %e, "skipping undecodable session metadata");
                    }
                    Err(e) => return Err(e),
                }
            }
            cursor = page.cursor;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    async fn sweep_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut cursor = 0;
        loop {
            let page = self.page(cursor, prefix).await?;
            for key in &page.keys {
                if self.store.ttl(key).await? == KeyTtl::Persistent && self.store.delete(key).await?
                {
                    debug!(key = %key, "removed orphaned registry key");
                    removed += 1;
                }
            }
            cursor = page.cursor;
            if cursor == 0 {
                return Ok(removed);
            }
        }
    }
}

#[async_trait]
impl SessionRegistry for StoreSessionRegistry {
    async fn register(
        &self,
        jti: &str,
        record: &TokenRecord,
        metadata: &SessionMetadata,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let record_json =
            serde_json::to_string(record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let meta_json =
            serde_json::to_string(metadata).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if !self
            .store
            .set_nx_with_ttl(&keys::token(jti), &record_json, ttl_secs)
            .await?
        {
            return Ok(false);
        }
        self.store
            .set_with_ttl(&keys::meta(jti), &meta_json, ttl_secs)
            .await?;
        Ok(true)
    }

    async fn status(&self, jti: &str) -> TokenStatus {
        match self.load::<TokenRecord>(&keys::token(jti)).await {
            Ok(Some(record)) => TokenStatus::Live(record),
            Ok(None) => TokenStatus::Revoked,
            Err(e) => {
                warn!(jti, error = %e, action = "status", "cannot confirm revocation status");
                TokenStatus::Unknown
            }
        }
    }

    async fn revoke_one(&self, jti: &str) -> bool {
        let mut event = AuditEvent::new(AuditAction::Revoked).jti(jti);
        if let Ok(Some(record)) = self.load::<TokenRecord>(&keys::token(jti)).await {
            event = event.user(record.user_id);
        }

        match self.delete_pair(jti).await {
            Ok(removed) => {
                self.audit.emit(event).await;
                removed
            }
            Err(e) => {
                warn!(jti, error = %e, action = "revoke", "failed to revoke token");
                self.audit
                    .emit(event.failed(AuditReason::RegistryUnavailable))
                    .await;
                false
            }
        }
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> usize {
        let mut revoked = 0;
        let outcome = self.revoke_matching(user_id, &mut revoked).await;

        let event = AuditEvent::new(AuditAction::Revoked).user(user_id);
        match outcome {
            Ok(()) => self.audit.emit(event).await,
            Err(e) => {
                warn!(
                    user_id,
                    revoked,
                    error = %e,
                    action = "revoke_all",
                    "sign-out everywhere stopped early"
                );
                self.audit
                    .emit(event.failed(AuditReason::RegistryUnavailable))
                    .await;
            }
        }
        revoked
    }

    async fn list_active_sessions(&self, user_id: &str) -> Vec<SessionDescriptor> {
        let mut sessions = Vec::new();
        if let Err(e) = self.collect_sessions(user_id, &mut sessions).await {
            warn!(user_id, error = %e, action = "list_sessions", "session listing is incomplete");
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    async fn sweep_orphans(&self) -> Result<usize, StoreError> {
        let tokens = self.sweep_prefix(TOKEN_PREFIX).await?;
        let metas = self.sweep_prefix(META_PREFIX).await?;
        Ok(tokens + metas)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::TokenKind;
    use crate::services::data_stores::MemoryStore;
    use crate::services::MemoryAuditSink;

    /// Memory store that cannot delete session metadata.
    struct StuckMetaStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for StuckMetaStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value).await
        }
        async fn set_with_ttl(&self, key: &str, value: &str, ttl: u64) -> Result<(), StoreError> {
            self.inner.set_with_ttl(key, value, ttl).await
        }
        async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl: u64) -> Result<bool, StoreError> {
            self.inner.set_nx_with_ttl(key, value, ttl).await
        }
        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.exists(key).await
        }
        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            if key.starts_with(META_PREFIX) {
                return Err(StoreError::Timeout(10));
            }
            self.inner.delete(key).await
        }
        async fn incr(&self, key: &str) -> Result<i64, StoreError> {
            self.inner.incr(key).await
        }
        async fn expire(&self, key: &str, ttl: u64) -> Result<bool, StoreError> {
            self.inner.expire(key, ttl).await
        }
        async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
            self.inner.ttl(key).await
        }
        async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StoreError> {
            self.inner.scan(cursor, pattern, count).await
        }
    }

    fn registry_with(batch: usize) -> (Arc<MemoryStore>, StoreSessionRegistry, MemoryAuditSink) {
        let store = Arc::new(MemoryStore::new());
        let sink = MemoryAuditSink::new();
        let audit = AuditLog::new().with_sink(Arc::new(sink.clone()));
        let registry = StoreSessionRegistry::new(store.clone(), audit, batch);
        (store, registry, sink)
    }

    fn entry(user_id: &str, kind: TokenKind) -> (TokenRecord, SessionMetadata) {
        (
            TokenRecord {
                user_id: user_id.to_string(),
                kind,
            },
            SessionMetadata {
                user_id: user_id.to_string(),
                kind,
                ip: Some("10.0.0.1".into()),
                user_agent: Some("test-agent".into()),
                device_id: Some("laptop".into()),
                created_at: Utc::now(),
            },
        )
    }

    async fn register(registry: &StoreSessionRegistry, jti: &str, user: &str) {
        let (record, meta) = entry(user, TokenKind::Access);
        assert!(registry.register(jti, &record, &meta, 600).await.unwrap());
    }

    #[tokio::test]
    async fn register_refuses_duplicate_jti() {
        let (_, registry, _) = registry_with(10);
        register(&registry, "j1", "alice").await;
        let (record, meta) = entry("bob", TokenKind::Refresh);
        assert!(!registry.register("j1", &record, &meta, 600).await.unwrap());
        assert_eq!(
            registry.status("j1").await,
            TokenStatus::Live(TokenRecord {
                user_id: "alice".into(),
                kind: TokenKind::Access
            })
        );
    }

    #[tokio::test]
    async fn revoke_one_is_idempotent_and_audited() {
        let (store, registry, sink) = registry_with(10);
        register(&registry, "j1", "alice").await;

        assert!(registry.revoke_one("j1").await);
        assert!(!registry.revoke_one("j1").await);
        assert_eq!(registry.status("j1").await, TokenStatus::Revoked);
        assert!(!store.exists(&keys::meta("j1")).await.unwrap());

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.action == AuditAction::Revoked && e.success));
        assert_eq!(events[0].user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn metadata_delete_failure_still_counts_as_revoked() {
        let store = Arc::new(StuckMetaStore {
            inner: MemoryStore::new(),
        });
        let sink = MemoryAuditSink::new();
        let registry = StoreSessionRegistry::new(
            store.clone(),
            AuditLog::new().with_sink(Arc::new(sink.clone())),
            10,
        );
        register(&registry, "j1", "alice").await;

        assert!(registry.revoke_one("j1").await);
        assert_eq!(registry.status("j1").await, TokenStatus::Revoked);
        // leftover metadata keeps its TTL
        assert!(matches!(
            store.ttl(&keys::meta("j1")).await.unwrap(),
            KeyTtl::Expiring(_)
        ));
        assert!(sink.events().await[0].success);
    }

    #[tokio::test]
    async fn revoke_all_spans_multiple_scan_pages() {
        // batch of 2 forces several cursor steps
        let (_, registry, _) = registry_with(2);
        for i in 0..5 {
            register(&registry, &format!("a{i}"), "alice").await;
        }
        register(&registry, "b0", "bob").await;

        assert_eq!(registry.revoke_all_for_user("alice").await, 5);
        for i in 0..5 {
            assert_eq!(
                registry.status(&format!("a{i}")).await,
                TokenStatus::Revoked
            );
        }
        assert!(matches!(registry.status("b0").await, TokenStatus::Live(_)));
    }

    #[tokio::test]
    async fn list_active_sessions_filters_by_owner() {
        let (_, registry, _) = registry_with(3);
        register(&registry, "a0", "alice").await;
        register(&registry, "a1", "alice").await;
        register(&registry, "b0", "bob").await;

        let sessions = registry.list_active_sessions("alice").await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.jti.starts_with('a')));
        assert_eq!(sessions[0].device_id.as_deref(), Some("laptop"));
        assert!(registry.list_active_sessions("carol").await.is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_only_keys_without_ttl() {
        let (store, registry, _) = registry_with(10);
        register(&registry, "live", "alice").await;
        store
            .set(&keys::token("orphan"), r#"{"user_id":"alice","kind":"access"}"#)
            .await
            .unwrap();
        store
            .set(&keys::meta("orphan-meta"), "{}")
            .await
            .unwrap();

        assert_eq!(registry.sweep_orphans().await.unwrap(), 2);
        assert!(!store.exists(&keys::token("orphan")).await.unwrap());
        assert!(matches!(registry.status("live").await, TokenStatus::Live(_)));
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_unknown() {
        let (store, registry, _) = registry_with(10);
        store
            .set_with_ttl(&keys::token("bad"), "not-json", 60)
            .await
            .unwrap();
        assert_eq!(registry.status("bad").await, TokenStatus::Unknown);
    }
}
