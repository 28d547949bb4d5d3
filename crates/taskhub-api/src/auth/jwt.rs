//! HS256 access tokens
//!
//! Every token gets a fresh `jti`, which is what the blacklist stores when a
//! session ends before the token expires.

use super::models::UserRecord;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use taskhub_core::AuthConfig;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// User ID
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub name: String,
    pub email: String,
    /// Administrator flag when the token was signed; authorization re-reads it
    pub is_admin: bool,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::Malformed)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Malformed token")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Signature or issuer mismatch")]
    BadSignature,
}

/// A freshly signed access token together with its claims
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs and verifies access tokens with the configured secret and issuer
#[derive(Clone)]
pub struct JwtSigner {
    issuer: String,
    ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.leeway = 0;

        Self {
            issuer: config.jwt_issuer.clone(),
            ttl: Duration::seconds(config.access_token_ttl_secs as i64),
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }

    pub fn sign(&self, user: &UserRecord) -> Result<IssuedAccessToken, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedAccessToken { token, claims })
    }

    /// Signature, issuer and expiry; the blacklist is checked elsewhere
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer => JwtError::BadSignature,
                _ => JwtError::Malformed,
            })
    }
}

/// Read claims without checking signature or expiry
///
/// For blacklist bookkeeping only. Never base an authentication decision on
/// the result.
pub fn decode_unverified(token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| JwtError::Malformed)
}
