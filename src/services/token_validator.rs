use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, Validation};
use tracing::{debug, warn};

use crate::domain::{
    AuditAction, AuditEvent, Claims, JwtKeyStore, SessionRegistry, TokenKind, TokenStatus,
};
use crate::errors::SessionError;
use crate::services::AuditLog;
use crate::utils::Config;

/// Verifies signed tokens and checks them against the registry.
#[derive(Clone)]
pub struct TokenValidator {
    cfg: Arc<Config>,
    keys: Arc<JwtKeyStore>,
    registry: Arc<dyn SessionRegistry>,
    audit: AuditLog,
}

impl TokenValidator {
    pub fn new(
        cfg: Arc<Config>,
        keys: Arc<JwtKeyStore>,
        registry: Arc<dyn SessionRegistry>,
        audit: AuditLog,
    ) -> Self {
        Self {
            cfg,
            keys,
            registry,
            audit,
        }
    }

    /// Validate a token:
    /// - Decodes the header, requires HS256 and selects the key by KID
    /// - Verifies signature, issuer, `nbf` and `exp` with no leeway
    /// - Checks the registry; a missing record means the token was revoked
    ///
    /// When the registry cannot answer, a cryptographically valid token is
    /// accepted and a warning is logged.
    pub async fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        self.audited(token, None).await.map(|(claims, _)| claims)
    }

    /// [`validate`](Self::validate) for request authentication: refresh
    /// tokens are refused as `Malformed` so they cannot stand in for the
    /// shorter-lived access token.
    pub async fn validate_access(&self, token: &str) -> Result<Claims, SessionError> {
        self.audited(token, Some(TokenKind::Access))
            .await
            .map(|(claims, _)| claims)
    }

    /// Like [`validate`](Self::validate) but also hands back the registry's
    /// answer, which rotation needs to tell the token kind apart.
    pub(crate) async fn inspect(
        &self,
        token: &str,
    ) -> Result<(Claims, TokenStatus), SessionError> {
        self.audited(token, None).await
    }

    async fn audited(
        &self,
        token: &str,
        expected: Option<TokenKind>,
    ) -> Result<(Claims, TokenStatus), SessionError> {
        let result = self.check(token, expected).await;

        let event = AuditEvent::new(AuditAction::Validated);
        match &result {
            Ok((claims, _)) => {
                self.audit
                    .emit(event.jti(&claims.jti).user(&claims.user_id))
                    .await
            }
            Err((e, claims)) => {
                let event = match claims {
                    Some(c) => event.jti(&c.jti).user(&c.user_id),
                    None => event,
                };
                self.audit.emit(event.failed(e.reason())).await
            }
        }

        result.map_err(|(e, _)| e)
    }

    // Failures carry the claims when the signature checked out, so the audit
    // trail can name the token.
    async fn check(
        &self,
        token: &str,
        expected: Option<TokenKind>,
    ) -> Result<(Claims, TokenStatus), (SessionError, Option<Claims>)> {
        let claims = self.verify(token).map_err(|e| (e, None))?;

        if claims.exp <= Utc::now().timestamp() {
            return Err((SessionError::Expired, Some(claims)));
        }

        if expected.is_some_and(|kind| kind != claims.kind) {
            debug!(jti = %claims.jti, kind = %claims.kind, "token kind not accepted here");
            return Err((SessionError::Malformed, Some(claims)));
        }

        if claims.jti.is_empty() {
            debug!(user_id = %claims.user_id, "token carries no jti, skipping revocation check");
            return Ok((claims, TokenStatus::Unknown));
        }

        let status = self.registry.status(&claims.jti).await;
        match status {
            TokenStatus::Revoked => Err((SessionError::Revoked, Some(claims))),
            TokenStatus::Unknown => {
                warn!(
                    jti = %claims.jti,
                    user_id = %claims.user_id,
                    action = "validate",
                    "cannot confirm revocation status, honouring signature"
                );
                Ok((claims, status))
            }
            TokenStatus::Disabled => {
                debug!(jti = %claims.jti, "no session registry, honouring signature");
                Ok((claims, status))
            }
            TokenStatus::Live(_) => Ok((claims, status)),
        }
    }

    fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        let header = decode_header(token).map_err(|_| SessionError::Malformed)?;
        if header.alg != Algorithm::HS256 {
            return Err(SessionError::Malformed);
        }

        let key = self
            .keys
            .decoding_key_for_kid(header.kid.as_deref())
            .ok_or(SessionError::Malformed)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.cfg.jwt_issuer()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;
    use crate::domain::{AuditReason, Role, TokenKind};
    use crate::services::data_stores::NoopSessionRegistry;
    use crate::services::MemoryAuditSink;

    const SECRET: [u8; 32] = [9u8; 32];

    fn validator(sink: &MemoryAuditSink) -> TokenValidator {
        let cfg = Config::new("test-issuer", vec![("k1".into(), SECRET.to_vec())], "k1")
            .expect("valid config");
        let keys = JwtKeyStore::from_config(cfg.jwt_keys(), cfg.jwt_active_kid())
            .expect("active kid exists");
        TokenValidator::new(
            Arc::new(cfg),
            Arc::new(keys),
            Arc::new(NoopSessionRegistry::default()),
            AuditLog::new().with_sink(Arc::new(sink.clone())),
        )
    }

    fn claims(offset_exp: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: "u1".into(),
            tenant_id: "t1".into(),
            email: "u1@example.com".into(),
            role: Role::Client,
            device_id: None,
            kind: TokenKind::Access,
            jti: "j1".into(),
            iat: now,
            exp: now + offset_exp,
            nbf: now,
            iss: "test-issuer".into(),
            sub: "u1".into(),
        }
    }

    fn sign(header: Header, claims: &Claims, secret: &[u8]) -> String {
        encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn hs256(kid: &str) -> Header {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.into());
        header
    }

    #[tokio::test]
    async fn accepts_well_formed_token() {
        let sink = MemoryAuditSink::new();
        let token = sign(hs256("k1"), &claims(600), &SECRET);
        let got = validator(&sink).validate(&token).await.expect("valid");
        assert_eq!(got.user_id, "u1");

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].jti.as_deref(), Some("j1"));
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let sink = MemoryAuditSink::new();
        let token = sign(hs256("k1"), &claims(-120), &SECRET);
        assert_eq!(
            validator(&sink).validate(&token).await.unwrap_err(),
            SessionError::Expired
        );
        assert_eq!(sink.events().await[0].reason, Some(AuditReason::Expired));
    }

    #[tokio::test]
    async fn other_algorithms_are_rejected() {
        let sink = MemoryAuditSink::new();
        let mut header = Header::new(Algorithm::HS512);
        header.kid = Some("k1".into());
        let token = sign(header, &claims(600), &SECRET);
        assert_eq!(
            validator(&sink).validate(&token).await.unwrap_err(),
            SessionError::Malformed
        );
    }

    #[tokio::test]
    async fn unsigned_token_is_rejected() {
        let sink = MemoryAuditSink::new();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(600)).unwrap());
        let token = format!("{header}.{payload}.");
        assert_eq!(
            validator(&sink).validate(&token).await.unwrap_err(),
            SessionError::Malformed
        );
    }

    #[tokio::test]
    async fn unknown_kid_wrong_issuer_and_bad_signature_are_malformed() {
        let sink = MemoryAuditSink::new();
        let v = validator(&sink);

        let unknown_kid = sign(hs256("nope"), &claims(600), &SECRET);
        assert_eq!(v.validate(&unknown_kid).await.unwrap_err(), SessionError::Malformed);

        let mut foreign = claims(600);
        foreign.iss = "someone-else".into();
        let wrong_issuer = sign(hs256("k1"), &foreign, &SECRET);
        assert_eq!(v.validate(&wrong_issuer).await.unwrap_err(), SessionError::Malformed);

        let bad_sig = sign(hs256("k1"), &claims(600), &[1u8; 32]);
        assert_eq!(v.validate(&bad_sig).await.unwrap_err(), SessionError::Malformed);

        assert_eq!(v.validate("not.a.jwt").await.unwrap_err(), SessionError::Malformed);
    }

    #[tokio::test]
    async fn access_path_refuses_refresh_tokens() {
        let sink = MemoryAuditSink::new();
        let v = validator(&sink);
        let mut refresh = claims(600);
        refresh.kind = TokenKind::Refresh;
        let token = sign(hs256("k1"), &refresh, &SECRET);

        assert_eq!(v.validate_access(&token).await.unwrap_err(), SessionError::Malformed);
        // rotation still needs to read it
        assert_eq!(v.validate(&token).await.unwrap().kind, TokenKind::Refresh);

        let access = sign(hs256("k1"), &claims(600), &SECRET);
        assert_eq!(v.validate_access(&access).await.unwrap().jti, "j1");

        let events = sink.events().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].reason, Some(AuditReason::Malformed));
        assert_eq!(events[0].jti.as_deref(), Some("j1"));
    }

    #[tokio::test]
    async fn not_yet_valid_token_is_malformed() {
        let sink = MemoryAuditSink::new();
        let mut future = claims(1200);
        future.nbf += 600;
        let token = sign(hs256("k1"), &future, &SECRET);
        assert_eq!(
            validator(&sink).validate(&token).await.unwrap_err(),
            SessionError::Malformed
        );
    }
}
