use thiserror::Error;

use crate::domain::AuditReason;

/// Caller-facing outcome of the session operations.
///
/// Variants are mutually exclusive so callers branch on the kind: `Expired`
/// means the client should refresh, `Revoked` means it must re-authenticate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("token is malformed or its signature is invalid")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("too many tokens issued, please retry later")]
    RateLimited,

    #[error("token is not a refresh token")]
    NotRefreshToken,

    #[error("token could not be signed")]
    Signing,
}

impl SessionError {
    pub fn reason(&self) -> AuditReason {
        match self {
            SessionError::Malformed => AuditReason::Malformed,
            SessionError::Expired => AuditReason::Expired,
            SessionError::Revoked => AuditReason::Revoked,
            SessionError::RateLimited => AuditReason::RateLimited,
            SessionError::NotRefreshToken => AuditReason::NotRefreshToken,
            SessionError::Signing => AuditReason::SigningFailed,
        }
    }
}
