use std::fmt;

use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed payload of both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(rename = "token_type")]
    pub kind: TokenKind,
    pub jti: String, // JWT ID, also the revocation key
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
    pub nbf: i64,    // Not before
    pub iss: String, // Issuer
    pub sub: String, // Subject (user ID)
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_reseller(&self) -> bool {
        self.role.is_reseller()
    }

    /// Only the top rank crosses tenant boundaries.
    pub fn can_access_tenant(&self, tenant_id: &str) -> bool {
        self.role == Role::SuperAdmin || self.tenant_id == tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with(role: Role, tenant: &str) -> Claims {
        Claims {
            user_id: "u-1".into(),
            tenant_id: tenant.into(),
            email: "u1@example.com".into(),
            role,
            device_id: None,
            kind: TokenKind::Access,
            jti: "jti-1".into(),
            iat: 0,
            exp: 10,
            nbf: 0,
            iss: "issuer".into(),
            sub: "u-1".into(),
        }
    }

    #[test]
    fn super_admin_crosses_tenants() {
        let claims = claims_with(Role::SuperAdmin, "t-1");
        assert!(claims.can_access_tenant("t-1"));
        assert!(claims.can_access_tenant("t-2"));
    }

    #[test]
    fn admin_is_bound_to_own_tenant() {
        let claims = claims_with(Role::Admin, "t-1");
        assert!(claims.is_admin());
        assert!(claims.can_access_tenant("t-1"));
        assert!(!claims.can_access_tenant("t-2"));
    }

    #[test]
    fn client_is_neither_admin_nor_reseller() {
        let claims = claims_with(Role::Client, "t-1");
        assert!(!claims.is_admin());
        assert!(!claims.is_reseller());
    }

    #[test]
    fn device_id_is_omitted_when_absent() {
        let json = serde_json::to_value(claims_with(Role::Client, "t-1")).unwrap();
        assert!(json.get("device_id").is_none());
        assert_eq!(json["token_type"], "access");
        assert_eq!(json["role"], "client");
    }
}
