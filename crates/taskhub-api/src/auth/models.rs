//! Rows behind authentication: users, role assignments, refresh tokens and
//! the access token blacklist. Password hashes never leave this layer;
//! responses are built from [`UserPublic`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskhub_core::Role;
use utoipa::ToSchema;
use uuid::Uuid;

/// User account row; not `Serialize`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    /// Stored trimmed and lowercased
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn to_public(&self) -> UserPublic {
        UserPublic::from(self)
    }
}

impl From<&UserRecord> for UserPublic {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// User as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserPublic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a user insert; the repository assigns ID and timestamps
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

/// Partial profile update
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Assignment of a role to a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role: Role,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Refresh token row
///
/// Only the SHA-256 hash of the opaque token is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(user_id: Uuid, token_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Can still be exchanged for a new token pair
    pub fn is_valid(&self) -> bool {
        !(self.is_revoked() || self.is_expired())
    }
}

/// Token blacklist entry
///
/// `expires_at` is the access token's own expiry; past it the entry is
/// redundant and gets purged.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlacklistEntry {
    pub token_jti: String,
    pub user_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub blacklisted_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(token_jti: String, user_id: Option<Uuid>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token_jti,
            user_id,
            expires_at,
            blacklisted_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
