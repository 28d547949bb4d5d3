//! Token service
//!
//! Issues access tokens and opaque refresh tokens, rotates and revokes
//! refresh tokens, and maintains the access token blacklist.
//!
//! Refresh tokens are 32 random bytes encoded as URL-safe base64. Only their
//! SHA-256 digest is stored, so a database dump does not yield usable tokens.

use super::jwt::{decode_unverified, Claims, IssuedAccessToken, JwtSigner};
use super::models::{BlacklistEntry, RefreshTokenRecord, UserRecord};
use super::repository::{RefreshTokenRepository, TokenBlacklistRepository};
use super::AuthError;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use taskhub_core::AuthConfig;
use uuid::Uuid;

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedRefreshToken {
    pub user_id: Uuid,
    /// Plaintext successor token, returned to the client once
    pub refresh_token: String,
}

/// Rows removed by [`TokenService::purge_expired`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub refresh_tokens: u64,
    pub blacklist_entries: u64,
}

/// Token issuance, rotation and revocation
#[derive(Clone)]
pub struct TokenService {
    jwt: JwtSigner,
    refresh_ttl: Duration,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    blacklist: Arc<dyn TokenBlacklistRepository>,
}

impl TokenService {
    pub fn new(
        config: &AuthConfig,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        blacklist: Arc<dyn TokenBlacklistRepository>,
    ) -> Self {
        Self {
            jwt: JwtSigner::new(config),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            refresh_tokens,
            blacklist,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl_secs(&self) -> u64 {
        self.jwt.ttl_secs()
    }

    /// Sign a new access token for the user
    pub fn issue_access_token(&self, user: &UserRecord) -> Result<IssuedAccessToken, AuthError> {
        Ok(self.jwt.sign(user)?)
    }

    /// Check signature, issuer and expiry; the blacklist is not consulted
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.jwt.verify(token)?)
    }

    /// Create and persist a new refresh token for the user
    pub async fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let token = generate_refresh_token();
        let record = RefreshTokenRecord::new(user_id, hash_token(&token), Utc::now() + self.refresh_ttl);

        self.refresh_tokens.insert(&record).await?;

        Ok(token)
    }

    /// Look up a refresh token without changing it
    pub async fn validate_refresh_token(
        &self,
        token: &str,
    ) -> Result<RefreshTokenRecord, AuthError> {
        match self.refresh_tokens.find_by_hash(&hash_token(token)).await? {
            Some(record) if record.is_valid() => Ok(record),
            _ => Err(AuthError::InvalidRefreshToken),
        }
    }

    /// Consume a refresh token and issue its successor
    ///
    /// The old token is marked revoked in the same statement that checks it,
    /// so of two concurrent rotations of one token only the first succeeds.
    pub async fn rotate_refresh_token(
        &self,
        old_token: &str,
    ) -> Result<RotatedRefreshToken, AuthError> {
        let consumed = self
            .refresh_tokens
            .consume(&hash_token(old_token))
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        let refresh_token = self.issue_refresh_token(consumed.user_id).await?;

        Ok(RotatedRefreshToken {
            user_id: consumed.user_id,
            refresh_token,
        })
    }

    /// Revoke one refresh token; revoking twice is not an error
    ///
    /// With `owner` set, a token belonging to someone else is left untouched.
    pub async fn revoke_refresh_token(
        &self,
        token: &str,
        owner: Option<Uuid>,
    ) -> Result<bool, AuthError> {
        Ok(self.refresh_tokens.revoke(&hash_token(token), owner).await?)
    }

    /// Revoke every live refresh token of the user
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self.refresh_tokens.revoke_all_for_user(user_id).await?)
    }

    /// Add an access token's jti to the blacklist until its own expiry
    ///
    /// The token is decoded without signature or expiry checks: only its
    /// identifier and expiry are needed.
    pub async fn blacklist_access_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = decode_unverified(token)?;

        let expires_at = claims
            .expires_at()
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.jwt.ttl_secs() as i64));
        let user_id = Uuid::parse_str(&claims.sub).ok();

        self.blacklist
            .insert(&BlacklistEntry::new(claims.jti, user_id, expires_at))
            .await?;

        Ok(())
    }

    /// True if the token's jti has a live blacklist entry
    ///
    /// A token that cannot be decoded at all is reported as not blacklisted;
    /// signature validation rejects it afterwards.
    pub async fn is_blacklisted(&self, token: &str) -> Result<bool, AuthError> {
        match decode_unverified(token) {
            Ok(claims) => Ok(self.blacklist.is_blacklisted(&claims.jti).await?),
            Err(_) => Ok(false),
        }
    }

    /// Delete expired refresh tokens and blacklist entries
    pub async fn purge_expired(&self) -> Result<PurgeReport, AuthError> {
        let refresh_tokens = self.refresh_tokens.delete_expired().await?;
        let blacklist_entries = self.blacklist.delete_expired().await?;

        if refresh_tokens > 0 || blacklist_entries > 0 {
            tracing::info!(refresh_tokens, blacklist_entries, "Purged expired tokens");
        }

        Ok(PurgeReport {
            refresh_tokens,
            blacklist_entries,
        })
    }
}

/// Generate a cryptographically secure refresh token
pub fn generate_refresh_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// SHA-256 hex digest used as the stored form of a refresh token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn service() -> (TokenService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        let service = TokenService::new(&AuthConfig::default(), store.clone(), store.clone());
        (service, store)
    }

    fn user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_refresh_token_shape() {
        let token = generate_refresh_token();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert_ne!(token, generate_refresh_token());

        let hash = hash_token(&token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(&token));
    }

    #[tokio::test]
    async fn test_issue_and_validate_refresh_token() {
        let (tokens, _) = service();
        let user_id = Uuid::new_v4();

        let token = tokens.issue_refresh_token(user_id).await.unwrap();
        let record = tokens.validate_refresh_token(&token).await.unwrap();

        assert_eq!(record.user_id, user_id);
        assert_eq!(record.token_hash, hash_token(&token));
        // validation does not consume
        assert_ok!(tokens.validate_refresh_token(&token).await);

        assert!(matches!(
            tokens.validate_refresh_token("unknown").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_rotation_is_single_use() {
        let (tokens, _) = service();
        let user_id = Uuid::new_v4();
        let original = tokens.issue_refresh_token(user_id).await.unwrap();

        let rotated = tokens.rotate_refresh_token(&original).await.unwrap();
        assert_eq!(rotated.user_id, user_id);
        assert_ne!(rotated.refresh_token, original);

        assert!(matches!(
            tokens.rotate_refresh_token(&original).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert_ok!(tokens.validate_refresh_token(&rotated.refresh_token).await);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_first_wins() {
        let (tokens, _) = service();
        let original = tokens.issue_refresh_token(Uuid::new_v4()).await.unwrap();

        let (a, b) = tokio::join!(
            tokens.rotate_refresh_token(&original),
            tokens.rotate_refresh_token(&original)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_rejected() {
        let (tokens, store) = service();
        let token = generate_refresh_token();
        let record = RefreshTokenRecord::new(
            Uuid::new_v4(),
            hash_token(&token),
            Utc::now() - Duration::seconds(1),
        );
        RefreshTokenRepository::insert(store.as_ref(), &record)
            .await
            .unwrap();

        assert_err!(tokens.validate_refresh_token(&token).await);
        assert_err!(tokens.rotate_refresh_token(&token).await);
    }

    #[tokio::test]
    async fn test_revoke_respects_owner_and_is_idempotent() {
        let (tokens, _) = service();
        let owner = Uuid::new_v4();
        let token = tokens.issue_refresh_token(owner).await.unwrap();

        assert!(!tokens
            .revoke_refresh_token(&token, Some(Uuid::new_v4()))
            .await
            .unwrap());
        assert_ok!(tokens.validate_refresh_token(&token).await);

        assert!(tokens.revoke_refresh_token(&token, Some(owner)).await.unwrap());
        assert!(!tokens.revoke_refresh_token(&token, Some(owner)).await.unwrap());
        assert_err!(tokens.validate_refresh_token(&token).await);
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let (tokens, _) = service();
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = tokens.issue_refresh_token(user_id).await.unwrap();
        let second = tokens.issue_refresh_token(user_id).await.unwrap();
        let unrelated = tokens.issue_refresh_token(other).await.unwrap();

        assert_eq!(tokens.revoke_all_for_user(user_id).await.unwrap(), 2);
        assert_err!(tokens.validate_refresh_token(&first).await);
        assert_err!(tokens.validate_refresh_token(&second).await);
        assert_ok!(tokens.validate_refresh_token(&unrelated).await);
    }

    #[tokio::test]
    async fn test_blacklist_access_token() {
        let (tokens, _) = service();
        let issued = tokens.issue_access_token(&user()).unwrap();

        assert!(!tokens.is_blacklisted(&issued.token).await.unwrap());

        tokens.blacklist_access_token(&issued.token).await.unwrap();
        // second insert is a no-op
        tokens.blacklist_access_token(&issued.token).await.unwrap();

        assert!(tokens.is_blacklisted(&issued.token).await.unwrap());
        // signature is still valid; the blacklist is a separate check
        assert_ok!(tokens.validate_access_token(&issued.token));

        assert!(!tokens.is_blacklisted("not-a-jwt").await.unwrap());
        assert!(matches!(
            tokens.blacklist_access_token("not-a-jwt").await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (tokens, store) = service();
        let stale = RefreshTokenRecord::new(
            Uuid::new_v4(),
            hash_token("stale"),
            Utc::now() - Duration::days(1),
        );
        RefreshTokenRepository::insert(store.as_ref(), &stale)
            .await
            .unwrap();
        TokenBlacklistRepository::insert(
            store.as_ref(),
            &BlacklistEntry::new("old-jti".to_string(), None, Utc::now() - Duration::hours(1)),
        )
        .await
        .unwrap();
        let live = tokens.issue_refresh_token(Uuid::new_v4()).await.unwrap();

        let report = tokens.purge_expired().await.unwrap();

        assert_eq!(
            report,
            PurgeReport {
                refresh_tokens: 1,
                blacklist_entries: 1
            }
        );
        assert_ok!(tokens.validate_refresh_token(&live).await);
        assert_eq!(tokens.purge_expired().await.unwrap(), PurgeReport::default());
    }
}
