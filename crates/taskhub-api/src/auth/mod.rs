//! Authentication and authorization
//!
//! - `jwt`: access token signing and validation
//! - `password`: Argon2id hashing and strength rules
//! - `tokens`: refresh token rotation, revocation and the access token blacklist
//! - `service`: registration, login, verification, refresh, logout
//! - `permissions`: capability resolution and the three access rules
//! - `admin`: user administration (status, roles, profile)
//! - `middleware`: bearer authentication and route gates
//! - `repository`: user, role, refresh token and blacklist stores

pub mod admin;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod permissions;
pub mod repository;
pub mod service;
pub mod tokens;

pub use admin::UserAdminService;
pub use jwt::{Claims, IssuedAccessToken, JwtError, JwtSigner};
pub use middleware::{auth_middleware, require_admin, require_capability, AuthenticatedUser};
pub use models::{RoleAssignment, UserPublic, UserRecord};
pub use password::{validate_password_strength, PasswordConfig, PasswordError};
pub use permissions::{authorize, AccessRule, Forbidden, Ownership, PermissionResolver, Principal};
pub use repository::{
    RefreshTokenRepository, RoleRepository, TokenBlacklistRepository, UserRepository,
};
pub use service::{
    AuthResponse, AuthService, ChangePasswordRequest, LoginRequest, LogoutRequest,
    RefreshRequest, RegisterRequest, UserProfile, VerifiedToken,
};
pub use tokens::{PurgeReport, RotatedRefreshToken, TokenService};

use crate::db::RepositoryError;
use thiserror::Error;

/// Authentication and authorization errors
///
/// Every authentication failure (`InvalidCredentials` through
/// `InvalidAuthHeader`) is reported to clients as the same generic 401; the
/// variant is only visible in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("User account is inactive")]
    UserInactive,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for every condition reported as 401
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::TokenInvalid
                | AuthError::TokenExpired
                | AuthError::TokenRevoked
                | AuthError::UserInactive
                | AuthError::InvalidRefreshToken
                | AuthError::MissingAuthHeader
                | AuthError::InvalidAuthHeader
        )
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::EmailAlreadyExists => AuthError::DuplicateEmail,
            RepositoryError::NotFound(what) => AuthError::NotFound(what),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::TokenExpired,
            JwtError::Malformed | JwtError::BadSignature => AuthError::TokenInvalid,
            JwtError::Signing(e) => AuthError::Internal(format!("Token signing failed: {e}")),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<Forbidden> for AuthError {
    fn from(err: Forbidden) -> Self {
        AuthError::Forbidden(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failures_are_grouped() {
        let unauthenticated = [
            AuthError::InvalidCredentials,
            AuthError::TokenInvalid,
            AuthError::TokenExpired,
            AuthError::TokenRevoked,
            AuthError::UserInactive,
            AuthError::InvalidRefreshToken,
            AuthError::MissingAuthHeader,
            AuthError::InvalidAuthHeader,
        ];
        assert!(unauthenticated.iter().all(AuthError::is_authentication_failure));

        assert!(!AuthError::DuplicateEmail.is_authentication_failure());
        assert!(!AuthError::IncorrectPassword.is_authentication_failure());
        assert!(!AuthError::Forbidden("x".into()).is_authentication_failure());
    }

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            AuthError::from(RepositoryError::EmailAlreadyExists),
            AuthError::DuplicateEmail
        ));
        assert!(matches!(
            AuthError::from(RepositoryError::NotFound("User".into())),
            AuthError::NotFound(_)
        ));
        assert!(matches!(
            AuthError::from(RepositoryError::DatabaseError("down".into())),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::TokenExpired));
        assert!(matches!(AuthError::from(JwtError::BadSignature), AuthError::TokenInvalid));
        assert!(matches!(AuthError::from(JwtError::Malformed), AuthError::TokenInvalid));
    }
}
