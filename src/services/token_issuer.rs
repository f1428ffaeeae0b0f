use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::{
    Account, AuditAction, AuditEvent, Claims, ClientContext, IssuedToken, IssuedTokens, JwtKeyStore,
    RateLimitDecision, RateLimiter, SessionMetadata, SessionRegistry, TokenKind, TokenRecord,
};
use crate::errors::SessionError;
use crate::services::AuditLog;
use crate::utils::Config;

// A v4 collision is not expected; the bound only keeps a misbehaving
// registry from looping forever.
const MAX_JTI_ATTEMPTS: usize = 3;

/// Signs access and refresh tokens and registers them for revocation.
///
/// Registry writes are best effort: if the store is down the token is still
/// handed out, it just cannot be revoked before it expires.
#[derive(Clone)]
pub struct TokenIssuer {
    cfg: Arc<Config>,
    keys: Arc<JwtKeyStore>,
    registry: Arc<dyn SessionRegistry>,
    limiter: Arc<dyn RateLimiter>,
    audit: AuditLog,
}

impl TokenIssuer {
    pub fn new(
        cfg: Arc<Config>,
        keys: Arc<JwtKeyStore>,
        registry: Arc<dyn SessionRegistry>,
        limiter: Arc<dyn RateLimiter>,
        audit: AuditLog,
    ) -> Self {
        Self {
            cfg,
            keys,
            registry,
            limiter,
            audit,
        }
    }

    /// Issue a single token of `kind`, counted against the user's rate limit.
    pub async fn issue(
        &self,
        account: &Account,
        kind: TokenKind,
        ctx: &ClientContext,
    ) -> Result<IssuedToken, SessionError> {
        self.admit(account, ctx).await?;
        self.issue_unchecked(account, kind, ctx).await
    }

    /// Issue an access + refresh pair bound to the same device. Counts as one
    /// issuance for rate limiting.
    pub async fn issue_pair(
        &self,
        account: &Account,
        ctx: &ClientContext,
    ) -> Result<IssuedTokens, SessionError> {
        self.admit(account, ctx).await?;
        let access = self.issue_unchecked(account, TokenKind::Access, ctx).await?;
        let refresh = self
            .issue_unchecked(account, TokenKind::Refresh, ctx)
            .await?;
        Ok(IssuedTokens {
            user_id: account.user_id.clone(),
            access,
            refresh,
        })
    }

    async fn admit(&self, account: &Account, ctx: &ClientContext) -> Result<(), SessionError> {
        if self.limiter.check(&account.user_id).await == RateLimitDecision::Limited {
            warn!(user_id = %account.user_id, "token issuance rate limited");
            self.audit
                .emit(
                    AuditEvent::new(AuditAction::Issued)
                        .user(&account.user_id)
                        .client(ctx.ip.as_deref(), ctx.user_agent.as_deref())
                        .failed(SessionError::RateLimited.reason()),
                )
                .await;
            return Err(SessionError::RateLimited);
        }
        Ok(())
    }

    async fn issue_unchecked(
        &self,
        account: &Account,
        kind: TokenKind,
        ctx: &ClientContext,
    ) -> Result<IssuedToken, SessionError> {
        let result = self.sign_and_register(account, kind, ctx).await;

        let event = AuditEvent::new(AuditAction::Issued)
            .user(&account.user_id)
            .client(ctx.ip.as_deref(), ctx.user_agent.as_deref());
        match &result {
            Ok(issued) => self.audit.emit(event.jti(&issued.jti)).await,
            Err(e) => self.audit.emit(event.failed(e.reason())).await,
        }
        result
    }

    async fn sign_and_register(
        &self,
        account: &Account,
        kind: TokenKind,
        ctx: &ClientContext,
    ) -> Result<IssuedToken, SessionError> {
        let ttl_seconds = match kind {
            TokenKind::Access => self.cfg.token_ttl_seconds(),
            TokenKind::Refresh => self.cfg.refresh_token_ttl_seconds(),
        };

        for attempt in 1..=MAX_JTI_ATTEMPTS {
            let now = Utc::now();
            let expires_at = Duration::try_seconds(ttl_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or_else(|| {
                    error!(ttl_seconds, "token expiry out of range");
                    SessionError::Signing
                })?;
            let claims = Claims {
                user_id: account.user_id.clone(),
                tenant_id: account.tenant_id.clone(),
                email: account.email.clone(),
                role: account.role,
                device_id: ctx.device_id.clone(),
                kind,
                jti: Uuid::new_v4().to_string(),
                iat: now.timestamp(),
                exp: expires_at.timestamp(),
                nbf: now.timestamp(),
                iss: self.cfg.jwt_issuer().to_owned(),
                sub: account.user_id.clone(),
            };

            let token = self.sign(&claims).map_err(|e| {
                error!(user_id = %account.user_id, error = %e, "failed to sign token");
                SessionError::Signing
            })?;

            let issued = IssuedToken {
                kind,
                jti: claims.jti.clone(),
                token,
                expires_at,
            };

            let record = TokenRecord {
                user_id: account.user_id.clone(),
                kind,
            };
            let metadata = SessionMetadata {
                user_id: account.user_id.clone(),
                kind,
                ip: ctx.ip.clone(),
                user_agent: ctx.user_agent.clone(),
                device_id: ctx.device_id.clone(),
                created_at: now,
            };

            match self
                .registry
                .register(&claims.jti, &record, &metadata, ttl_seconds.max(1) as u64)
                .await
            {
                Ok(true) => return Ok(issued),
                Ok(false) => {
                    warn!(jti = %claims.jti, attempt, "jti already registered, drawing a new one");
                }
                Err(e) => {
                    warn!(
                        jti = %claims.jti,
                        user_id = %account.user_id,
                        error = %e,
                        action = "issue",
                        "failed to register token, it cannot be revoked early"
                    );
                    return Ok(issued);
                }
            }
        }

        error!(user_id = %account.user_id, "could not obtain a unique jti");
        Err(SessionError::Signing)
    }

    fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        let (enc_key, kid) = self.keys.encoding_key_and_kid();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());

        encode(&header, claims, enc_key)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Role, SessionDescriptor, StoreError, TokenStatus};
    use crate::services::{MemoryAuditSink, NoopRateLimiter};

    /// Claims every JTI is taken.
    struct FullRegistry;

    #[async_trait]
    impl SessionRegistry for FullRegistry {
        async fn register(
            &self,
            _: &str,
            _: &TokenRecord,
            _: &SessionMetadata,
            _: u64,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn status(&self, _: &str) -> TokenStatus {
            TokenStatus::Unknown
        }
        async fn revoke_one(&self, _: &str) -> bool {
            false
        }
        async fn revoke_all_for_user(&self, _: &str) -> usize {
            0
        }
        async fn list_active_sessions(&self, _: &str) -> Vec<SessionDescriptor> {
            Vec::new()
        }
        async fn sweep_orphans(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn issuer_with(registry: Arc<dyn SessionRegistry>, sink: &MemoryAuditSink) -> TokenIssuer {
        let cfg = Config::new("test-issuer", vec![("k1".into(), vec![7u8; 32])], "k1")
            .expect("valid config");
        issuer_from(cfg, registry, sink)
    }

    fn issuer_from(
        cfg: Config,
        registry: Arc<dyn SessionRegistry>,
        sink: &MemoryAuditSink,
    ) -> TokenIssuer {
        let keys = JwtKeyStore::from_config(cfg.jwt_keys(), cfg.jwt_active_kid())
            .expect("active kid exists");
        TokenIssuer::new(
            Arc::new(cfg),
            Arc::new(keys),
            registry,
            Arc::new(NoopRateLimiter),
            AuditLog::new().with_sink(Arc::new(sink.clone())),
        )
    }

    #[tokio::test]
    async fn gives_up_when_every_jti_is_taken() {
        let sink = MemoryAuditSink::new();
        let issuer = issuer_with(Arc::new(FullRegistry), &sink);
        let account = Account::new("u1", "t1", "u1@example.com", Role::Client);

        let result = issuer
            .issue(&account, TokenKind::Access, &ClientContext::default())
            .await;
        assert_eq!(result.unwrap_err(), SessionError::Signing);

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn header_carries_hs256_and_active_kid() {
        let sink = MemoryAuditSink::new();
        let issuer = issuer_with(
            Arc::new(crate::services::data_stores::NoopSessionRegistry::default()),
            &sink,
        );
        let account = Account::new("u1", "t1", "u1@example.com", Role::Admin);

        let issued = issuer
            .issue(&account, TokenKind::Refresh, &ClientContext::default())
            .await
            .expect("issued");
        let header = jsonwebtoken::decode_header(&issued.token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(issued.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn oversized_ttls_issue_within_the_cap() {
        let sink = MemoryAuditSink::new();
        let cfg = Config::new("test-issuer", vec![("k1".into(), vec![7u8; 32])], "k1")
            .expect("valid config")
            .with_token_ttls(i64::MAX, i64::MAX);
        let issuer = issuer_from(
            cfg,
            Arc::new(crate::services::data_stores::NoopSessionRegistry::default()),
            &sink,
        );
        let account = Account::new("u1", "t1", "u1@example.com", Role::Client);

        let issued = issuer
            .issue(&account, TokenKind::Access, &ClientContext::default())
            .await
            .expect("issued");
        let lifetime = (issued.expires_at - Utc::now()).num_seconds();
        assert!(lifetime <= crate::utils::defaults::MAX_TOKEN_TTL_SECONDS);
        assert!(lifetime > crate::utils::defaults::MAX_TOKEN_TTL_SECONDS - 60);
    }
}
