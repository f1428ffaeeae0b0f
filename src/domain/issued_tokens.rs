use chrono::{DateTime, Utc};

use super::TokenKind;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub kind: TokenKind,
    pub jti: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub user_id: String,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

impl IssuedTokens {
    pub fn access_token(&self) -> &str {
        &self.access.token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh.token
    }
}
