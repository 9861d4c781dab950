//! Role and capability models.

use crate::errors::{LedgerError, LedgerResult, UnknownVariant};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// User ID type
pub type UserId = i64;

/// Account role stored on the user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

/// Privileged operation classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Approve or reject withdraw requests, list all requests
    ManageWithdrawals,
    /// Credit or debit any wallet directly
    AdjustBalances,
    /// Change another account's role
    ManageRoles,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    /// Whether this role grants `capability`
    pub fn grants(self, capability: Capability) -> bool {
        match capability {
            Capability::ManageWithdrawals | Capability::AdjustBalances => {
                matches!(self, Role::Admin | Role::SuperAdmin)
            }
            Capability::ManageRoles => self == Role::SuperAdmin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ManageWithdrawals => write!(f, "manage withdrawals"),
            Capability::AdjustBalances => write!(f, "adjust balances"),
            Capability::ManageRoles => write!(f, "manage roles"),
        }
    }
}

/// The authenticated caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Capability gate
    ///
    /// # Errors
    ///
    /// * `LedgerError::PermissionDenied` - The actor's role lacks `capability`
    pub fn require(&self, capability: Capability) -> LedgerResult<()> {
        if self.role.grants(capability) {
            Ok(())
        } else {
            log::warn!(
                "User {} ({}) denied: requires {}",
                self.user_id,
                self.role,
                capability
            );
            Err(LedgerError::PermissionDenied(format!(
                "requires permission to {capability}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_storage_text() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("staff".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_has_no_privileges() {
        let actor = Actor::new(7, Role::User);
        for capability in [
            Capability::ManageWithdrawals,
            Capability::AdjustBalances,
            Capability::ManageRoles,
        ] {
            assert!(matches!(
                actor.require(capability),
                Err(LedgerError::PermissionDenied(_))
            ));
        }
    }

    #[test]
    fn test_admin_cannot_manage_roles() {
        let actor = Actor::new(1, Role::Admin);
        assert!(actor.require(Capability::ManageWithdrawals).is_ok());
        assert!(actor.require(Capability::AdjustBalances).is_ok());
        assert!(actor.require(Capability::ManageRoles).is_err());
    }

    #[test]
    fn test_superadmin_has_everything() {
        let actor = Actor::new(1, Role::SuperAdmin);
        assert!(actor.require(Capability::ManageRoles).is_ok());
        assert!(actor.require(Capability::ManageWithdrawals).is_ok());
    }
}
