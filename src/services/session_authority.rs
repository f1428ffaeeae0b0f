//! Single handle over the session components.
//!
//! - Issues access and refresh tokens for authenticated accounts
//! - Validates tokens (signature, expiry, revocation, kind)
//! - Rotates refresh tokens with reuse detection
//! - Revokes single tokens or every session of a user
//!
//! Which collaborators back it is decided at construction: with a shared
//! store the registry, rate limiter and (optionally) the audit sink live in
//! that store; without one, revocation and rate limiting are disabled.
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    Account, ClientContext, Claims, IssuedToken, IssuedTokens, JwtKeyStore, KeyValueStore,
    RateLimiter, SessionDescriptor, SessionRegistry, TokenKind,
};
use crate::errors::SessionError;
use crate::services::data_stores::{NoopSessionRegistry, RedisService, StoreSessionRegistry};
use crate::services::{
    AuditLog, CleanupSweeper, FixedWindowRateLimiter, KeyValueAuditSink, NoopRateLimiter,
    RotationManager, TokenIssuer, TokenValidator,
};
use crate::utils::{Config, ConfigError};

#[derive(Clone)]
pub struct SessionAuthority {
    cfg: Arc<Config>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    rotation: RotationManager,
    registry: Arc<dyn SessionRegistry>,
}

impl SessionAuthority {
    /// Wire the components around explicit collaborators.
    pub fn new(
        cfg: Arc<Config>,
        registry: Arc<dyn SessionRegistry>,
        limiter: Arc<dyn RateLimiter>,
        audit: AuditLog,
    ) -> Result<Self, ConfigError> {
        let keys = Arc::new(
            JwtKeyStore::from_config(cfg.jwt_keys(), cfg.jwt_active_kid())
                .ok_or(ConfigError::Invalid("JWT_ACTIVE_KID"))?,
        );

        let issuer = TokenIssuer::new(
            cfg.clone(),
            keys.clone(),
            registry.clone(),
            limiter,
            audit.clone(),
        );
        let validator = TokenValidator::new(cfg.clone(), keys, registry.clone(), audit.clone());
        let rotation = RotationManager::new(
            issuer.clone(),
            validator.clone(),
            registry.clone(),
            audit,
        );

        Ok(Self {
            cfg,
            issuer,
            validator,
            rotation,
            registry,
        })
    }

    /// Build on top of a key-value store, or in degraded mode when `store`
    /// is `None`.
    pub fn with_store(
        cfg: Arc<Config>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Result<Self, ConfigError> {
        Self::with_store_and_audit(cfg, store, AuditLog::new())
    }

    /// Like [`with_store`](Self::with_store) with extra audit sinks already
    /// attached to `audit`.
    pub fn with_store_and_audit(
        cfg: Arc<Config>,
        store: Option<Arc<dyn KeyValueStore>>,
        mut audit: AuditLog,
    ) -> Result<Self, ConfigError> {
        let Some(store) = store else {
            warn!("no session store configured, revocation and rate limiting are disabled");
            let registry = Arc::new(NoopSessionRegistry::new(audit.clone()));
            return Self::new(cfg, registry, Arc::new(NoopRateLimiter), audit);
        };

        if let Some(retention) = cfg.audit_retention_seconds() {
            audit = audit.with_sink(Arc::new(KeyValueAuditSink::new(store.clone(), retention)));
        }

        let registry = Arc::new(StoreSessionRegistry::new(
            store.clone(),
            audit.clone(),
            cfg.scan_batch_size(),
        ));
        let limiter = Arc::new(FixedWindowRateLimiter::new(
            store,
            cfg.rate_limit_max(),
            cfg.rate_limit_window_seconds(),
        ));
        Self::new(cfg, registry, limiter, audit)
    }

    /// Build from configuration alone, connecting to Redis when a host is
    /// configured.
    pub fn from_config(cfg: Arc<Config>) -> Result<Self, ConfigError> {
        let store: Option<Arc<dyn KeyValueStore>> = match cfg.redis_host() {
            Some(host) => {
                let redis = RedisService::new(host, cfg.store_timeout())
                    .map_err(|_| ConfigError::Invalid("REDIS_HOST"))?;
                info!(host, "using redis session store");
                Some(Arc::new(redis))
            }
            None => None,
        };
        Self::with_store(cfg, store)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Issue an access token.
    pub async fn issue(
        &self,
        account: &Account,
        ctx: &ClientContext,
    ) -> Result<IssuedToken, SessionError> {
        self.issuer.issue(account, TokenKind::Access, ctx).await
    }

    /// Issue a refresh token on its own.
    pub async fn issue_refresh(
        &self,
        account: &Account,
        ctx: &ClientContext,
    ) -> Result<IssuedToken, SessionError> {
        self.issuer.issue(account, TokenKind::Refresh, ctx).await
    }

    /// Issue the access + refresh pair handed out at login.
    pub async fn issue_pair(
        &self,
        account: &Account,
        ctx: &ClientContext,
    ) -> Result<IssuedTokens, SessionError> {
        self.issuer.issue_pair(account, ctx).await
    }

    /// Validate a token of either kind.
    pub async fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        self.validator.validate(token).await
    }

    /// Validate a bearer token on a request. Only access tokens pass.
    pub async fn validate_access(&self, token: &str) -> Result<Claims, SessionError> {
        self.validator.validate_access(token).await
    }

    pub async fn rotate(
        &self,
        refresh_token: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, SessionError> {
        self.rotation.rotate(refresh_token, ip, user_agent).await
    }

    pub async fn revoke_one(&self, jti: &str) -> bool {
        self.registry.revoke_one(jti).await
    }

    pub async fn revoke_all_for_user(&self, user_id: &str) -> usize {
        self.registry.revoke_all_for_user(user_id).await
    }

    pub async fn list_active_sessions(&self, user_id: &str) -> Vec<SessionDescriptor> {
        self.registry.list_active_sessions(user_id).await
    }

    pub fn registry(&self) -> Arc<dyn SessionRegistry> {
        self.registry.clone()
    }

    /// A sweeper over this authority's registry at the configured interval.
    pub fn cleanup_sweeper(&self) -> CleanupSweeper {
        CleanupSweeper::new(self.registry.clone(), self.cfg.sweep_interval())
    }
}
