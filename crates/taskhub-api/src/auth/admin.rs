//! User administration
//!
//! Listing, profile edits, activation and role management. Administrators
//! cannot deactivate themselves or drop their own `admin` role, so a
//! deployment is never left without a way back in through the API.

use super::models::{RoleAssignment, UserProfileUpdate, UserPublic, UserRecord};
use super::permissions::{AccessRule, Ownership, Principal};
use super::repository::{RoleRepository, UserRepository};
use super::tokens::TokenService;
use super::AuthError;
use crate::activity::{ActivityAction, ActivityLogger, EntityType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use taskhub_core::{Capability, Role};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Profile update request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,
}

/// Activation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

/// Role assignment request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub role: Role,
}

/// User administration service
#[derive(Clone)]
pub struct UserAdminService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    tokens: TokenService,
    activity: ActivityLogger,
}

impl UserAdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        tokens: TokenService,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
            activity,
        }
    }

    async fn load(&self, id: Uuid) -> Result<UserRecord, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))
    }

    fn is_self(principal: &Principal, id: Uuid) -> Ownership {
        (principal.user_id == id).into()
    }

    pub async fn list_users(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserPublic>, AuthError> {
        principal.require(AccessRule::RoleOrAdmin(Capability::UsersRead), Ownership::NotOwner)?;

        let users = self.users.list_users(limit, offset).await?;
        Ok(users.iter().map(UserRecord::to_public).collect())
    }

    /// Own record, or anyone with `UsersRead`
    pub async fn get_user(&self, principal: &Principal, id: Uuid) -> Result<UserPublic, AuthError> {
        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::UsersRead),
            Self::is_self(principal, id),
        )?;

        Ok(self.load(id).await?.to_public())
    }

    /// Own profile, or administrators
    pub async fn update_profile(
        &self,
        principal: &Principal,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserPublic, AuthError> {
        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::UsersManage),
            Self::is_self(principal, id),
        )?;

        let request = UpdateUserRequest {
            name: request.name.map(|n| n.trim().to_string()),
            phone: request.phone.map(|p| p.trim().to_string()),
        };
        request.validate()?;

        let user = self
            .users
            .update_profile(
                id,
                &UserProfileUpdate {
                    name: request.name,
                    phone: request.phone,
                },
            )
            .await?;

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Updated,
                EntityType::User,
                id,
                json!({ "fields": ["name", "phone"] }),
            )
            .await;

        Ok(user.to_public())
    }

    /// Activate or deactivate; deactivation revokes every refresh token
    pub async fn set_status(
        &self,
        principal: &Principal,
        id: Uuid,
        is_active: bool,
    ) -> Result<UserPublic, AuthError> {
        principal.require(AccessRule::AdminOnly, Ownership::NotOwner)?;

        if principal.user_id == id && !is_active {
            return Err(AuthError::Validation(
                "Administrators cannot deactivate their own account".to_string(),
            ));
        }

        let user = self.users.set_active(id, is_active).await?;

        if !is_active {
            let revoked = self.tokens.revoke_all_for_user(id).await?;
            tracing::info!(user_id = %id, revoked, "Revoked refresh tokens of deactivated user");
        }

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::StatusChanged,
                EntityType::User,
                id,
                json!({ "is_active": is_active }),
            )
            .await;

        Ok(user.to_public())
    }

    /// Own assignments, or anyone with `UsersRead`
    pub async fn list_roles(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Vec<RoleAssignment>, AuthError> {
        principal.require(
            AccessRule::OwnerOrRoleOrAdmin(Capability::UsersRead),
            Self::is_self(principal, id),
        )?;

        self.load(id).await?;
        Ok(self.roles.list_assignments(id).await?)
    }

    /// Assign a role; a previously revoked assignment is reactivated
    pub async fn assign_role(
        &self,
        principal: &Principal,
        id: Uuid,
        role: Role,
    ) -> Result<RoleAssignment, AuthError> {
        principal.require(AccessRule::AdminOnly, Ownership::NotOwner)?;

        self.load(id).await?;
        let assignment = self
            .roles
            .assign_role(id, role, Some(principal.user_id))
            .await?;

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Assigned,
                EntityType::User,
                id,
                json!({ "role": role }),
            )
            .await;

        Ok(assignment)
    }

    pub async fn revoke_role(
        &self,
        principal: &Principal,
        id: Uuid,
        role: Role,
    ) -> Result<(), AuthError> {
        principal.require(AccessRule::AdminOnly, Ownership::NotOwner)?;

        if principal.user_id == id && role == Role::Admin {
            return Err(AuthError::Validation(
                "Administrators cannot revoke their own admin role".to_string(),
            ));
        }

        if !self.roles.revoke_role(id, role).await? {
            return Err(AuthError::NotFound("Role assignment".to_string()));
        }

        self.activity
            .record(
                Some(principal.user_id),
                ActivityAction::Updated,
                EntityType::User,
                id,
                json!({ "revoked_role": role }),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use taskhub_core::AuthConfig;

    struct Fixture {
        store: Arc<InMemoryStore>,
        admin: UserAdminService,
        tokens: TokenService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::default());
        let tokens = TokenService::new(&AuthConfig::default(), store.clone(), store.clone());
        let admin = UserAdminService::new(
            store.clone(),
            store.clone(),
            tokens.clone(),
            ActivityLogger::new(store.clone()),
        );
        Fixture {
            store,
            admin,
            tokens,
        }
    }

    async fn admin_principal(store: &InMemoryStore) -> Principal {
        let user = store.seed_user("root@example.com", true).await;
        Principal::from_user(&user, vec![])
    }

    #[tokio::test]
    async fn test_deactivation_revokes_refresh_tokens() {
        let f = fixture();
        let admin = admin_principal(&f.store).await;
        let user = f.store.seed_user("alice@example.com", false).await;
        let refresh = f.tokens.issue_refresh_token(user.id).await.unwrap();

        let updated = f.admin.set_status(&admin, user.id, false).await.unwrap();

        assert!(!updated.is_active);
        assert!(f.tokens.validate_refresh_token(&refresh).await.is_err());
    }

    #[tokio::test]
    async fn test_admin_cannot_lock_self_out() {
        let f = fixture();
        let admin = admin_principal(&f.store).await;

        assert!(matches!(
            f.admin.set_status(&admin, admin.user_id, false).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            f.admin.revoke_role(&admin, admin.user_id, Role::Admin).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_manage() {
        let f = fixture();
        let lead_user = f.store.seed_user("lead@example.com", false).await;
        let lead = Principal::from_user(&lead_user, vec![Role::ResponsableProyecto]);
        let other = f.store.seed_user("other@example.com", false).await;

        assert!(matches!(
            f.admin.set_status(&lead, other.id, false).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(matches!(
            f.admin.assign_role(&lead, other.id, Role::Admin).await,
            Err(AuthError::Forbidden(_))
        ));
        assert!(matches!(
            f.admin
                .update_profile(&lead, other.id, UpdateUserRequest::default())
                .await,
            Err(AuthError::Forbidden(_))
        ));
        // UsersRead is granted to project leads
        assert!(f.admin.get_user(&lead, other.id).await.is_ok());
        assert_eq!(f.admin.list_users(&lead, 50, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_role_reassignment_reactivates() {
        let f = fixture();
        let admin = admin_principal(&f.store).await;
        let user = f.store.seed_user("alice@example.com", false).await;

        f.admin
            .assign_role(&admin, user.id, Role::ResponsableTarea)
            .await
            .unwrap();
        f.admin
            .revoke_role(&admin, user.id, Role::ResponsableTarea)
            .await
            .unwrap();
        assert!(matches!(
            f.admin.revoke_role(&admin, user.id, Role::ResponsableTarea).await,
            Err(AuthError::NotFound(_))
        ));

        let assignment = f
            .admin
            .assign_role(&admin, user.id, Role::ResponsableTarea)
            .await
            .unwrap();
        assert!(assignment.active);
        assert_eq!(assignment.assigned_by, Some(admin.user_id));

        let assignments = f.admin.list_roles(&admin, user.id).await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_user_edits_own_profile() {
        let f = fixture();
        let user = f.store.seed_user("alice@example.com", false).await;
        let me = Principal::from_user(&user, vec![]);

        let updated = f
            .admin
            .update_profile(
                &me,
                user.id,
                UpdateUserRequest {
                    name: Some("Alice Liddell".to_string()),
                    phone: Some("555-0100".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Alice Liddell");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert!(f.admin.get_user(&me, user.id).await.is_ok());
    }
}
