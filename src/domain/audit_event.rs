use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Issued,
    Validated,
    Revoked,
    Rotated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Issued => "issued",
            AuditAction::Validated => "validated",
            AuditAction::Revoked => "revoked",
            AuditAction::Rotated => "rotated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure code attached to unsuccessful events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditReason {
    Malformed,
    Expired,
    Revoked,
    RateLimited,
    NotRefreshToken,
    SigningFailed,
    RegistryUnavailable,
    RegistryDisabled,
}

impl AuditReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditReason::Malformed => "malformed",
            AuditReason::Expired => "expired",
            AuditReason::Revoked => "revoked",
            AuditReason::RateLimited => "rate_limited",
            AuditReason::NotRefreshToken => "not_refresh_token",
            AuditReason::SigningFailed => "signing_failed",
            AuditReason::RegistryUnavailable => "registry_unavailable",
            AuditReason::RegistryDisabled => "registry_disabled",
        }
    }
}

impl fmt::Display for AuditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub jti: Option<String>,
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub reason: Option<AuditReason>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            jti: None,
            user_id: None,
            action,
            ip: None,
            user_agent: None,
            success: true,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn client(mut self, ip: Option<&str>, user_agent: Option<&str>) -> Self {
        self.ip = ip.map(str::to_owned);
        self.user_agent = user_agent.map(str::to_owned);
        self
    }

    pub fn failed(mut self, reason: AuditReason) -> Self {
        self.success = false;
        self.reason = Some(reason);
        self
    }
}
