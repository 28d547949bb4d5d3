//! Authentication repositories
//!
//! Trait per aggregate (users, role assignments, refresh tokens, blacklist)
//! with a PostgreSQL implementation using hand-written SQL through sqlx.

use super::models::{
    BlacklistEntry, NewUser, RefreshTokenRecord, RoleAssignment, UserProfileUpdate, UserRecord,
};
use crate::db::{is_foreign_key_violation, is_unique_violation, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use taskhub_core::Role;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, is_active, is_admin, created_at, updated_at";

const REFRESH_TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, revoked_at, created_at";

/// User store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with `EmailAlreadyExists` on a duplicate email
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError>;

    /// Look up by already-normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepositoryError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<UserRecord, RepositoryError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<UserRecord, RepositoryError>;

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<UserRecord, RepositoryError>;

    /// Newest first
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepositoryError>;
}

/// Role assignment store
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Roles whose assignment is currently active
    async fn active_roles(&self, user_id: Uuid) -> Result<Vec<Role>, RepositoryError>;

    /// All assignments including revoked ones
    async fn list_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>, RepositoryError>;

    /// Assign a role, reactivating an existing revoked assignment
    async fn assign_role(
        &self,
        user_id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
    ) -> Result<RoleAssignment, RepositoryError>;

    /// Soft-revoke; returns false when there was no active assignment
    async fn revoke_role(&self, user_id: Uuid, role: Role) -> Result<bool, RepositoryError>;
}

/// Refresh token store
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError>;

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;

    /// Atomically mark a live token revoked and return it
    ///
    /// Returns `None` when the token is unknown, already revoked or expired.
    /// Of two concurrent calls with the same hash at most one gets `Some`.
    async fn consume(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;

    /// Revoke one token, optionally only if it belongs to `owner`
    async fn revoke(&self, token_hash: &str, owner: Option<Uuid>) -> Result<bool, RepositoryError>;

    /// Revoke every live token of a user; returns how many were revoked
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError>;

    async fn delete_expired(&self) -> Result<u64, RepositoryError>;
}

/// Access token blacklist store
#[async_trait]
pub trait TokenBlacklistRepository: Send + Sync {
    /// Insert an entry; inserting the same jti twice is not an error
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), RepositoryError>;

    /// True if the jti has an entry that has not expired yet
    async fn is_blacklisted(&self, jti: &str) -> Result<bool, RepositoryError>;

    async fn delete_expired(&self) -> Result<u64, RepositoryError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL user store
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, RepositoryError> {
        let query = format!(
            "INSERT INTO users (id, name, email, password_hash, phone, is_active, is_admin, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6, NOW(), NOW()) \
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.phone)
            .bind(user.is_admin)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::EmailAlreadyExists
                } else {
                    RepositoryError::from(e)
                }
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");

        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<UserRecord, RepositoryError> {
        let query = format!(
            "UPDATE users SET name = COALESCE($1, name), phone = COALESCE($2, phone), updated_at = NOW() \
             WHERE id = $3 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(&update.name)
            .bind(&update.phone)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<UserRecord, RepositoryError> {
        let query = format!(
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
    }

    async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<UserRecord, RepositoryError> {
        let query = format!(
            "UPDATE users SET is_admin = $1, updated_at = NOW() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(is_admin)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("User".to_string()))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserRecord>, RepositoryError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );

        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Role assignment row joined with the role name
#[derive(Debug, FromRow)]
struct RoleAssignmentRow {
    user_id: Uuid,
    role_name: String,
    active: bool,
    assigned_by: Option<Uuid>,
    assigned_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<RoleAssignmentRow> for RoleAssignment {
    type Error = RepositoryError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        Ok(RoleAssignment {
            user_id: row.user_id,
            role: row.role_name.parse()?,
            active: row.active,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            revoked_at: row.revoked_at,
        })
    }
}

/// PostgreSQL role assignment store
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn active_roles(&self, user_id: Uuid) -> Result<Vec<Role>, RepositoryError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 AND ur.active ORDER BY r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            match name.parse::<Role>() {
                Ok(role) => roles.push(role),
                Err(_) => tracing::warn!(%user_id, role = %name, "Ignoring unknown role"),
            }
        }
        Ok(roles)
    }

    async fn list_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleAssignmentRow>(
            "SELECT ur.user_id, r.name AS role_name, ur.active, ur.assigned_by, ur.assigned_at, ur.revoked_at \
             FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RoleAssignment::try_from).collect()
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role: Role,
        assigned_by: Option<Uuid>,
    ) -> Result<RoleAssignment, RepositoryError> {
        let row = sqlx::query_as::<_, RoleAssignmentRow>(
            r#"
            INSERT INTO user_roles (user_id, role_id, active, assigned_by, assigned_at, revoked_at)
            SELECT $1, r.id, TRUE, $3, NOW(), NULL FROM roles r WHERE r.name = $2
            ON CONFLICT (user_id, role_id) DO UPDATE
                SET active = TRUE,
                    assigned_by = EXCLUDED.assigned_by,
                    assigned_at = NOW(),
                    revoked_at = NULL
            RETURNING user_id, $2::text AS role_name, active, assigned_by, assigned_at, revoked_at
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(assigned_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                RepositoryError::NotFound("User".to_string())
            } else {
                RepositoryError::from(e)
            }
        })?
        .ok_or_else(|| RepositoryError::NotFound(format!("Role {role}")))?;

        row.try_into()
    }

    async fn revoke_role(&self, user_id: Uuid, role: Role) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE user_roles SET active = FALSE, revoked_at = NOW() \
             WHERE user_id = $1 AND active AND role_id = (SELECT id FROM roles WHERE name = $2)",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// PostgreSQL refresh token store
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let query = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1");

        Ok(sqlx::query_as::<_, RefreshTokenRecord>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn consume(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        // Single conditional update: the row lock serializes concurrent callers
        // and only the first still sees `revoked_at IS NULL`.
        let query = format!(
            "UPDATE refresh_tokens SET revoked_at = NOW() \
             WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW() \
             RETURNING {REFRESH_TOKEN_COLUMNS}"
        );

        Ok(sqlx::query_as::<_, RefreshTokenRecord>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn revoke(&self, token_hash: &str, owner: Option<Uuid>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() \
             WHERE token_hash = $1 AND revoked_at IS NULL AND ($2::uuid IS NULL OR user_id = $2)",
        )
        .bind(token_hash)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// PostgreSQL blacklist store
pub struct PgTokenBlacklistRepository {
    pool: PgPool,
}

impl PgTokenBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenBlacklistRepository for PgTokenBlacklistRepository {
    async fn insert(&self, entry: &BlacklistEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO token_blacklist (token_jti, user_id, expires_at, blacklisted_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (token_jti) DO NOTHING",
        )
        .bind(&entry.token_jti)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .bind(entry.blacklisted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM token_blacklist WHERE token_jti = $1 AND expires_at > NOW()",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
