//! Authentication service layer
//!
//! Registration, login, access token verification, refresh token rotation,
//! password change and logout. Storage goes through the repository traits so
//! the same logic runs against PostgreSQL and the in-memory store.

use super::jwt::Claims;
use super::models::{NewUser, UserPublic, UserRecord};
use super::password::{
    hash_password_async, hash_password_with_config, validate_password_strength,
    verify_password_async, PasswordConfig,
};
use super::permissions::PermissionResolver;
use super::repository::UserRepository;
use super::tokens::TokenService;
use super::AuthError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskhub_core::{Capability, Role};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Password hashed at startup and verified against when the login email is
/// unknown, so both failure paths cost one Argon2 verification.
const DUMMY_PASSWORD: &str = "Dummy-Passw0rd!";

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub phone: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Authentication response with tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: UserPublic,
}

/// Result of a successful access token verification
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user: UserRecord,
    pub claims: Claims,
}

/// Current user with resolved roles and capabilities
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub user: UserPublic,
    pub roles: Vec<Role>,
    pub capabilities: Vec<Capability>,
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        AuthError::Validation(errors.to_string())
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
    resolver: PermissionResolver,
    password_config: PasswordConfig,
    dummy_hash: String,
}

impl AuthService {
    /// Create the service; hashes the dummy password once
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenService,
        resolver: PermissionResolver,
        password_config: PasswordConfig,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hash_password_with_config(DUMMY_PASSWORD, &password_config)?;

        Ok(Self {
            users,
            tokens,
            resolver,
            password_config,
            dummy_hash,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new (non-administrator) user
    pub async fn register(&self, request: RegisterRequest) -> Result<UserPublic, AuthError> {
        self.create_user(request, false).await
    }

    /// Validate, hash and persist a user
    ///
    /// Fails with `DuplicateEmail` if the email is already registered in any
    /// letter case.
    pub async fn create_user(
        &self,
        request: RegisterRequest,
        is_admin: bool,
    ) -> Result<UserPublic, AuthError> {
        let request = RegisterRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            password: request.password,
            phone: request
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        };

        request.validate()?;
        validate_password_strength(&request.password).map_err(AuthError::Validation)?;

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash =
            hash_password_async(request.password, self.password_config.clone()).await?;

        // The unique index still guards against a concurrent registration
        let user = self
            .users
            .create_user(NewUser {
                name: request.name,
                email: request.email,
                password_hash,
                phone: request.phone,
                is_admin,
            })
            .await?;

        tracing::info!(user_id = %user.id, is_admin, "User created");

        Ok(user.to_public())
    }

    /// Login with email and password
    ///
    /// Unknown email, inactive account and wrong password all fail with
    /// `InvalidCredentials` after one password verification.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            let _ = verify_password_async(request.password, self.dummy_hash.clone()).await;
            return Err(AuthError::InvalidCredentials);
        };

        let password_valid =
            verify_password_async(request.password, user.password_hash.clone()).await?;

        if !password_valid || !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_session(user).await
    }

    /// Verify an access token and re-fetch its user
    ///
    /// Order: blacklist, then signature and expiry, then the user row.
    pub async fn verify_token(&self, access_token: &str) -> Result<VerifiedToken, AuthError> {
        if self.tokens.is_blacklisted(access_token).await? {
            return Err(AuthError::TokenRevoked);
        }

        let claims = self.tokens.validate_access_token(access_token)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        Ok(VerifiedToken { user, claims })
    }

    /// Exchange a refresh token for a new access token and a successor refresh token
    pub async fn refresh_access_token(
        &self,
        request: RefreshRequest,
    ) -> Result<AuthResponse, AuthError> {
        let rotated = self.tokens.rotate_refresh_token(&request.refresh_token).await?;

        let user = match self.users.find_by_id(rotated.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.tokens
                    .revoke_refresh_token(&rotated.refresh_token, None)
                    .await?;
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        let access = self.tokens.issue_access_token(&user)?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: rotated.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl_secs(),
            user: user.to_public(),
        })
    }

    /// Change the password after re-verifying the current one
    ///
    /// Outstanding refresh tokens are left valid.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

        let current_valid =
            verify_password_async(request.current_password.clone(), user.password_hash).await?;
        if !current_valid {
            return Err(AuthError::IncorrectPassword);
        }

        validate_password_strength(&request.new_password).map_err(AuthError::Validation)?;
        if request.new_password == request.current_password {
            return Err(AuthError::Validation(
                "New password must differ from the current password".to_string(),
            ));
        }

        let password_hash =
            hash_password_async(request.new_password, self.password_config.clone()).await?;
        self.users.update_password(user_id, &password_hash).await?;

        Ok(())
    }

    /// End one session
    ///
    /// Blacklists the access token and revokes the refresh token if it belongs
    /// to `user_id`. Calling it twice is not an error.
    pub async fn logout(
        &self,
        user_id: Uuid,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(token) = access_token {
            self.tokens.blacklist_access_token(token).await?;
        }

        if let Some(token) = refresh_token {
            self.tokens.revoke_refresh_token(token, Some(user_id)).await?;
        }

        Ok(())
    }

    /// Revoke every refresh token of the user and blacklist the calling access token
    ///
    /// Returns the number of refresh tokens revoked. Other access tokens stay
    /// valid until they expire.
    pub async fn logout_all(
        &self,
        user_id: Uuid,
        access_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;

        if let Some(token) = access_token {
            self.tokens.blacklist_access_token(token).await?;
        }

        Ok(revoked)
    }

    /// Profile with active roles and capabilities
    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

        let principal = self.resolver.resolve(&user).await?;
        let capabilities = if principal.is_administrator() {
            Capability::ALL.to_vec()
        } else {
            principal.capabilities.into_iter().collect()
        };

        Ok(UserProfile {
            user: user.to_public(),
            roles: principal.roles,
            capabilities,
        })
    }

    async fn issue_session(&self, user: UserRecord) -> Result<AuthResponse, AuthError> {
        let access = self.tokens.issue_access_token(&user)?;
        let refresh_token = self.tokens.issue_refresh_token(user.id).await?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl_secs(),
            user: user.to_public(),
        })
    }
}
