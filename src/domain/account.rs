use super::{Claims, Role};

/// Identity handed to the issuer by the account module once credentials
/// have been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub role: Role,
}

impl Account {
    pub fn new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            email: email.into(),
            role,
        }
    }
}

impl From<&Claims> for Account {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id.clone(),
            tenant_id: claims.tenant_id.clone(),
            email: claims.email.clone(),
            role: claims.role,
        }
    }
}

/// Request-side details recorded with a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub device_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
