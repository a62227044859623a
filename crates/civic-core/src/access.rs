//! Caller identity and the admin capability
//!
//! Resolving credentials to a [`Caller`] happens outside the core. The core
//! only requires that status transitions present an [`AdminCapability`],
//! which can be obtained from an admin caller and nowhere else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Someone with direct access to the store, e.g. the `civic` CLI
    pub fn operator() -> Self {
        Self::new("operator", Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on behalf of any user, everyone else only as themselves
    pub fn can_act_as(&self, user_id: &str) -> bool {
        self.is_admin() || self.user_id == user_id
    }

    pub fn admin_capability(&self) -> Option<AdminCapability> {
        self.is_admin().then(|| AdminCapability {
            admin_id: self.user_id.clone(),
        })
    }
}

/// Proof that the holder is an admin
#[derive(Debug, Clone)]
pub struct AdminCapability {
    admin_id: String,
}

impl AdminCapability {
    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admins_get_capability() {
        assert!(Caller::new("u1", Role::User).admin_capability().is_none());
        let cap = Caller::new("boss", Role::Admin).admin_capability().unwrap();
        assert_eq!(cap.admin_id(), "boss");
        assert!(Caller::operator().admin_capability().is_some());
    }

    #[test]
    fn test_can_act_as() {
        let user = Caller::new("u1", Role::User);
        assert!(user.can_act_as("u1"));
        assert!(!user.can_act_as("u2"));
        assert!(Caller::new("boss", Role::Admin).can_act_as("u2"));
    }

    #[test]
    fn test_role_serde() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(Role::User.to_string(), "user");
    }
}
