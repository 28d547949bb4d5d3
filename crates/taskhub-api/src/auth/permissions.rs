//! Permission resolution
//!
//! A [`Principal`] is built once per request from the user row and the
//! user's active roles. Route and resource checks go through [`authorize`],
//! which evaluates one of three closed [`AccessRule`] shapes:
//!
//! - `AdminOnly`: administrators only
//! - `RoleOrAdmin(c)`: administrators, or any role granting `c`
//! - `OwnerOrRoleOrAdmin(c)`: as above, or the owner of the resource
//!
//! The administrator flag (or an active `admin` role) bypasses every rule.

use super::models::UserRecord;
use super::repository::RoleRepository;
use crate::db::RepositoryError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use taskhub_core::{Capability, Role};
use thiserror::Error;
use uuid::Uuid;

/// Authenticated user with resolved roles and capabilities
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub roles: Vec<Role>,
    pub capabilities: BTreeSet<Capability>,
}

impl Principal {
    pub fn new(user_id: Uuid, email: String, name: String, is_admin: bool, roles: Vec<Role>) -> Self {
        let capabilities = roles
            .iter()
            .flat_map(|role| role.capabilities().iter().copied())
            .collect();

        Self {
            user_id,
            email,
            name,
            is_admin,
            roles,
            capabilities,
        }
    }

    pub fn from_user(user: &UserRecord, roles: Vec<Role>) -> Self {
        Self::new(user.id, user.email.clone(), user.name.clone(), user.is_admin, roles)
    }

    /// Administrator flag or an active `admin` role
    pub fn is_administrator(&self) -> bool {
        self.is_admin || self.roles.contains(&Role::Admin)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.is_administrator() || self.capabilities.contains(&capability)
    }

    /// Shorthand for [`authorize`] with this principal
    pub fn require(&self, rule: AccessRule, ownership: Ownership) -> Result<(), Forbidden> {
        authorize(self, rule, ownership)
    }
}

/// Whether the principal owns the resource being accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owner,
    NotOwner,
}

impl From<bool> for Ownership {
    fn from(owns: bool) -> Self {
        if owns {
            Ownership::Owner
        } else {
            Ownership::NotOwner
        }
    }
}

/// Authorization rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    AdminOnly,
    RoleOrAdmin(Capability),
    OwnerOrRoleOrAdmin(Capability),
}

/// Authorization denial
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Forbidden {
    #[error("administrator privileges required")]
    AdminRequired,

    #[error("missing capability {}", .0.as_str())]
    MissingCapability(Capability),

    #[error("not the owner of this resource and missing capability {}", .0.as_str())]
    NotOwner(Capability),
}

impl From<Forbidden> for taskhub_core::TaskhubError {
    fn from(err: Forbidden) -> Self {
        taskhub_core::TaskhubError::AccessDenied {
            reason: err.to_string(),
        }
    }
}

/// Evaluate a rule for a principal
///
/// `ownership` only matters for `OwnerOrRoleOrAdmin`; callers pass
/// `Ownership::NotOwner` for the other rules.
pub fn authorize(
    principal: &Principal,
    rule: AccessRule,
    ownership: Ownership,
) -> Result<(), Forbidden> {
    if principal.is_administrator() {
        return Ok(());
    }

    match rule {
        AccessRule::AdminOnly => Err(Forbidden::AdminRequired),
        AccessRule::RoleOrAdmin(capability) => {
            if principal.capabilities.contains(&capability) {
                Ok(())
            } else {
                Err(Forbidden::MissingCapability(capability))
            }
        }
        AccessRule::OwnerOrRoleOrAdmin(capability) => {
            if ownership == Ownership::Owner || principal.capabilities.contains(&capability) {
                Ok(())
            } else {
                Err(Forbidden::NotOwner(capability))
            }
        }
    }
}

/// Builds principals from the role store
#[derive(Clone)]
pub struct PermissionResolver {
    roles: Arc<dyn RoleRepository>,
}

impl PermissionResolver {
    pub fn new(roles: Arc<dyn RoleRepository>) -> Self {
        Self { roles }
    }

    /// Load the user's active roles and compute the capability set
    pub async fn resolve(&self, user: &UserRecord) -> Result<Principal, RepositoryError> {
        let roles = self.roles.active_roles(user.id).await?;
        Ok(Principal::from_user(user, roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn principal(is_admin: bool, roles: Vec<Role>) -> Principal {
        Principal::new(
            Uuid::new_v4(),
            "p@example.com".to_string(),
            "P".to_string(),
            is_admin,
            roles,
        )
    }

    #[test]
    fn test_capabilities_are_union_of_roles() {
        let p = principal(false, vec![Role::ResponsableTarea]);
        assert!(p.has_capability(Capability::TasksUpdate));
        assert!(!p.has_capability(Capability::TasksCreate));

        let p = principal(false, vec![Role::ResponsableTarea, Role::ResponsableProyecto]);
        assert!(p.has_capability(Capability::TasksCreate));
        assert!(p.has_capability(Capability::ProjectsCreate));
        assert!(!p.has_capability(Capability::UsersManage));
    }

    #[test]
    fn test_admin_role_counts_as_administrator() {
        let p = principal(false, vec![Role::Admin]);
        assert!(p.is_administrator());
        assert!(authorize(&p, AccessRule::AdminOnly, Ownership::NotOwner).is_ok());
    }

    #[test]
    fn test_rules() {
        let lead = principal(false, vec![Role::ResponsableProyecto]);
        let worker = principal(false, vec![Role::ResponsableTarea]);
        let nobody = principal(false, vec![]);

        assert_eq!(
            authorize(&lead, AccessRule::AdminOnly, Ownership::Owner),
            Err(Forbidden::AdminRequired)
        );

        assert!(authorize(
            &lead,
            AccessRule::RoleOrAdmin(Capability::ProjectsCreate),
            Ownership::NotOwner
        )
        .is_ok());
        assert_eq!(
            authorize(
                &worker,
                AccessRule::RoleOrAdmin(Capability::ProjectsCreate),
                Ownership::Owner
            ),
            Err(Forbidden::MissingCapability(Capability::ProjectsCreate))
        );

        // ownership override
        assert!(authorize(
            &nobody,
            AccessRule::OwnerOrRoleOrAdmin(Capability::ProjectsDelete),
            Ownership::Owner
        )
        .is_ok());
        assert_eq!(
            authorize(
                &nobody,
                AccessRule::OwnerOrRoleOrAdmin(Capability::ProjectsDelete),
                Ownership::NotOwner
            ),
            Err(Forbidden::NotOwner(Capability::ProjectsDelete))
        );
    }

    #[tokio::test]
    async fn test_resolver_ignores_revoked_roles() {
        use crate::memory::InMemoryStore;

        let store = Arc::new(InMemoryStore::default());
        let user = store.seed_user("lead@example.com", false).await;
        store
            .assign_role(user.id, Role::ResponsableProyecto, None)
            .await
            .unwrap();
        store
            .assign_role(user.id, Role::ResponsableTarea, None)
            .await
            .unwrap();
        store.revoke_role(user.id, Role::ResponsableProyecto).await.unwrap();

        let resolver = PermissionResolver::new(store);
        let principal = resolver.resolve(&user).await.unwrap();

        assert_eq!(principal.roles, vec![Role::ResponsableTarea]);
        assert!(!principal.has_capability(Capability::ProjectsCreate));
    }

    fn arb_rule() -> impl Strategy<Value = AccessRule> {
        let capability = prop::sample::select(Capability::ALL.to_vec());
        prop_oneof![
            Just(AccessRule::AdminOnly),
            capability.clone().prop_map(AccessRule::RoleOrAdmin),
            capability.prop_map(AccessRule::OwnerOrRoleOrAdmin),
        ]
    }

    fn arb_roles() -> impl Strategy<Value = Vec<Role>> {
        prop::sample::subsequence(Role::ALL.to_vec(), 0..=Role::ALL.len())
    }

    proptest! {
        #[test]
        fn prop_admin_flag_bypasses_every_rule(
            roles in arb_roles(),
            rule in arb_rule(),
            owner in any::<bool>(),
        ) {
            let p = principal(true, roles);
            prop_assert!(authorize(&p, rule, owner.into()).is_ok());
        }

        #[test]
        fn prop_non_admin_is_denied_admin_only(owner in any::<bool>()) {
            let p = principal(false, vec![Role::ResponsableProyecto, Role::ResponsableTarea]);
            prop_assert_eq!(
                authorize(&p, AccessRule::AdminOnly, owner.into()),
                Err(Forbidden::AdminRequired)
            );
        }

        #[test]
        fn prop_role_rule_matches_capability_set(
            roles in arb_roles(),
            capability in prop::sample::select(Capability::ALL.to_vec()),
            owner in any::<bool>(),
        ) {
            let p = principal(false, roles);
            let allowed = authorize(&p, AccessRule::RoleOrAdmin(capability), owner.into()).is_ok();
            prop_assert_eq!(allowed, p.has_capability(capability));
        }

        #[test]
        fn prop_owner_is_always_allowed_by_owner_rule(
            roles in arb_roles(),
            capability in prop::sample::select(Capability::ALL.to_vec()),
        ) {
            let p = principal(false, roles);
            prop_assert!(authorize(&p, AccessRule::OwnerOrRoleOrAdmin(capability), Ownership::Owner).is_ok());
        }
    }
}
