use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand_core::OsRng;
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
#[error("failed to hash password: {0}")]
pub struct PasswordHashError(String);

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError(err.to_string()))
}

/// Check a password against a stored PHC string. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool, keeping Argon2 off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordHashError> {
    task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| PasswordHashError(err.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    password: String,
    stored: String,
) -> Result<bool, PasswordHashError> {
    task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|err| PasswordHashError(err.to_string()))
}
