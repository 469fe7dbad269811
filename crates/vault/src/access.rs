//! Role-based access control
//!
//! `check(caller, role)` is evaluated before each privileged entrypoint.
//! Roles are independent; the vault owner starts with all of them.

use keel_core::{AccountId, ConfigError, Role};
use log::info;
use std::collections::{HashMap, HashSet};

use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: HashMap<AccountId, HashSet<Role>>,
}

impl AccessControl {
    /// Access control where `owner` holds every role
    pub fn with_owner(owner: impl Into<AccountId>) -> Self {
        let mut access = Self::default();
        let owner = owner.into();
        for role in Role::ALL {
            access.grant(owner.clone(), role);
        }
        access
    }

    pub fn check(&self, caller: &str, role: Role) -> VaultResult<()> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            Err(VaultError::Unauthorized {
                caller: caller.to_string(),
                role,
            })
        }
    }

    pub fn has_role(&self, account: &str, role: Role) -> bool {
        self.grants
            .get(account)
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Returns `false` if the account already had the role
    pub fn grant(&mut self, account: impl Into<AccountId>, role: Role) -> bool {
        let account = account.into();
        let added = self.grants.entry(account.clone()).or_default().insert(role);
        if added {
            info!("[ACCESS] Granted {:?} to {}", role, account);
        }
        added
    }

    /// Revoke a role. The last admin cannot be removed.
    pub fn revoke(&mut self, account: &str, role: Role) -> VaultResult<bool> {
        if role == Role::Admin && self.has_role(account, Role::Admin) && self.admin_count() == 1 {
            return Err(ConfigError::invalid("role", "cannot revoke the last admin").into());
        }

        let removed = self
            .grants
            .get_mut(account)
            .is_some_and(|roles| roles.remove(&role));
        if removed {
            info!("[ACCESS] Revoked {:?} from {}", role, account);
        }
        Ok(removed)
    }

    fn admin_count(&self) -> usize {
        self.grants
            .values()
            .filter(|roles| roles.contains(&Role::Admin))
            .count()
    }
}
