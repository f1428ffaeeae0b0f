use std::sync::Arc;

use tracing::warn;

use crate::domain::{
    Account, AuditAction, AuditEvent, Claims, ClientContext, IssuedTokens, SessionRegistry,
    TokenKind, TokenStatus,
};
use crate::errors::SessionError;
use crate::services::{AuditLog, TokenIssuer, TokenValidator};

/// One-time-use refresh on top of the issuer, validator and registry.
///
/// A refresh token is revoked as soon as it has been exchanged, so any
/// later presentation of it reads as `Revoked`.
#[derive(Clone)]
pub struct RotationManager {
    issuer: TokenIssuer,
    validator: TokenValidator,
    registry: Arc<dyn SessionRegistry>,
    audit: AuditLog,
}

impl RotationManager {
    pub fn new(
        issuer: TokenIssuer,
        validator: TokenValidator,
        registry: Arc<dyn SessionRegistry>,
        audit: AuditLog,
    ) -> Self {
        Self {
            issuer,
            validator,
            registry,
            audit,
        }
    }

    /// Exchange a refresh token for a new access + refresh pair bound to the
    /// same device.
    pub async fn rotate(
        &self,
        refresh_token: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedTokens, SessionError> {
        let mut claims_seen = None;
        let result = self
            .exchange(refresh_token, ip, user_agent, &mut claims_seen)
            .await;

        let mut event = AuditEvent::new(AuditAction::Rotated).client(ip, user_agent);
        if let Some(claims) = &claims_seen {
            event = event.jti(&claims.jti).user(&claims.user_id);
        }
        match &result {
            Ok(_) => self.audit.emit(event).await,
            Err(e) => self.audit.emit(event.failed(e.reason())).await,
        }
        result
    }

    async fn exchange(
        &self,
        refresh_token: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        claims_seen: &mut Option<Claims>,
    ) -> Result<IssuedTokens, SessionError> {
        let (claims, status) = match self.validator.inspect(refresh_token).await {
            Ok(found) => found,
            Err(SessionError::Revoked) => {
                warn!(action = "rotate", "revoked refresh token presented, possible reuse");
                return Err(SessionError::Revoked);
            }
            Err(e) => return Err(e),
        };
        *claims_seen = Some(claims.clone());

        // The registry's record wins; the claim is the fallback when it
        // cannot answer.
        let kind = match &status {
            TokenStatus::Live(record) => record.kind,
            _ => claims.kind,
        };
        if kind != TokenKind::Refresh || claims.kind != TokenKind::Refresh {
            return Err(SessionError::NotRefreshToken);
        }

        let ctx = ClientContext {
            device_id: claims.device_id.clone(),
            ip: ip.map(str::to_owned),
            user_agent: user_agent.map(str::to_owned),
        };
        let pair = self.issuer.issue_pair(&Account::from(&claims), &ctx).await?;

        let removed = self.registry.revoke_one(&claims.jti).await;
        if !removed && matches!(status, TokenStatus::Live(_)) {
            // Another instance exchanged the same token between our status
            // check and the revoke. Only one of us may hand out a pair.
            warn!(
                jti = %claims.jti,
                user_id = %claims.user_id,
                action = "rotate",
                "refresh token exchanged concurrently, discarding new pair"
            );
            self.registry.revoke_one(&pair.access.jti).await;
            self.registry.revoke_one(&pair.refresh.jti).await;
            return Err(SessionError::Revoked);
        }

        Ok(pair)
    }
}
