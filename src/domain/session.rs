use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TokenKind;

/// Value stored under `session:token:{jti}`. Presence means the token is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub user_id: String,
    pub kind: TokenKind,
}

/// Value stored under `session:meta:{jti}`.
///
/// Only used to list sessions and to log anomalies; authorization never
/// looks at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_id: String,
    pub kind: TokenKind,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDescriptor {
    pub jti: String,
    pub kind: TokenKind,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionDescriptor {
    pub fn from_metadata(jti: impl Into<String>, meta: SessionMetadata) -> Self {
        Self {
            jti: jti.into(),
            kind: meta.kind,
            ip: meta.ip,
            user_agent: meta.user_agent,
            device_id: meta.device_id,
            created_at: meta.created_at,
        }
    }
}

/// Answer of the registry about a JTI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Live(TokenRecord),
    Revoked,
    /// No registry is configured.
    Disabled,
    /// The registry could not be reached or returned garbage.
    Unknown,
}
