//! Password hashing.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};
use common::Secret;
use thiserror::Error;

/// Hashing a password failed.
#[derive(Debug, Clone, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashError(String);

/// Trait for one-way password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plain-text password.
    fn hash(&self, password: &Secret) -> Result<String, PasswordHashError>;

    /// Checks a plain-text password against a stored hash.
    fn verify(&self, password: &Secret, hashed: &str) -> bool;
}

/// Argon2id hasher with the crate's default parameters.
///
/// Hashes are stored as PHC strings (`$argon2id$v=19$...`), which carry their
/// own salt and parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordHasher;

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &Secret) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed = Argon2::default()
            .hash_password(password.expose().as_bytes(), &salt)
            .map_err(|e| PasswordHashError(e.to_string()))?;
        Ok(hashed.to_string())
    }

    fn verify(&self, password: &Secret, hashed: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.expose().as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_same_password() {
        let hasher = Argon2PasswordHasher::new();
        let hashed = hasher.hash(&Secret::new("correct horse")).unwrap();

        assert!(hashed.starts_with("$argon2"));
        assert!(hasher.verify(&Secret::new("correct horse"), &hashed));
        assert!(!hasher.verify(&Secret::new("battery staple"), &hashed));
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = Argon2PasswordHasher::new();
        let password = Secret::new("changethis");

        assert_ne!(
            hasher.hash(&password).unwrap(),
            hasher.hash(&password).unwrap()
        );
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hasher = Argon2PasswordHasher::new();
        assert!(!hasher.verify(&Secret::new("x"), "plaintext"));
        assert!(!hasher.verify(&Secret::new("x"), "sha256$salt$digest"));
    }
}
