use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse role carried in the signed claims.
///
/// Variants are declared lowest rank first so the derived `Ord` gives the
/// hierarchy: `Client < Reseller < Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Reseller,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Reseller => "reseller",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self >= Role::Admin
    }

    pub fn is_reseller(&self) -> bool {
        *self >= Role::Reseller
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "reseller" => Ok(Role::Reseller),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_ordered() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::Reseller);
        assert!(Role::Reseller > Role::Client);
    }

    #[test]
    fn admin_and_reseller_predicates() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Reseller.is_admin());
        assert!(!Role::Client.is_admin());

        assert!(Role::Admin.is_reseller());
        assert!(Role::Reseller.is_reseller());
        assert!(!Role::Client.is_reseller());
    }

    #[test]
    fn parses_and_serializes_snake_case() {
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        let err = "root".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("root".into()));
        assert_eq!(err.to_string(), "unknown role: root");
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
    }
}
