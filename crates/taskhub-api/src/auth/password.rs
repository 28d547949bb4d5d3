//! Argon2id password hashing and the password strength policy
//!
//! Stored hashes are PHC strings: algorithm, cost parameters and salt travel
//! with the digest, so verification keeps working after the configured costs
//! change. Hashing runs on the blocking pool through the `_async` wrappers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use taskhub_core::AuthConfig;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

const DIGEST_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Argon2 rejected the input: {0}")]
    Argon2(String),

    #[error("Stored password hash is not a PHC string")]
    MalformedHash,

    #[error("Hashing task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            memory_cost: config.password_memory_cost,
            time_cost: config.password_time_cost,
            parallelism: config.password_parallelism,
        }
    }
}

impl PasswordConfig {
    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(DIGEST_LEN),
        )
        .map_err(|e| PasswordError::Argon2(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash `password` with a fresh random salt
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    config
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Argon2(e.to_string()))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;

    // parameters come from the PHC string, not from the current config
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Argon2(e.to_string())),
    }
}

async fn on_blocking_pool<T, F>(work: F) -> Result<T, PasswordError>
where
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

pub async fn hash_password_async(
    password: String,
    config: PasswordConfig,
) -> Result<String, PasswordError> {
    on_blocking_pool(move || hash_password_with_config(&password, &config)).await
}

pub async fn verify_password_async(password: String, stored: String) -> Result<bool, PasswordError> {
    on_blocking_pool(move || verify_password(&password, &stored)).await
}

/// Character classes a password must contain, with the message for each
const REQUIRED_CLASSES: &[(fn(char) -> bool, &str)] = &[
    (char::is_uppercase, "an uppercase letter"),
    (char::is_lowercase, "a lowercase letter"),
    (|c| c.is_ascii_digit(), "a digit"),
    (|c| !c.is_alphanumeric(), "a special character"),
];

/// Check length bounds and required character classes
///
/// The error names the first rule that failed.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&length) {
        return Err(format!(
            "Password must be {MIN_PASSWORD_LEN} to {MAX_PASSWORD_LEN} characters long"
        ));
    }

    match REQUIRED_CLASSES
        .iter()
        .find(|(present, _)| !password.chars().any(*present))
    {
        Some((_, missing)) => Err(format!("Password must contain {missing}")),
        None => Ok(()),
    }
}
