//! Pluggable credential hashing.
//!
//! The auth service never looks at stored credential material itself; it hands the
//! raw password to a [`CredentialHasher`] at registration and asks the same hasher
//! to verify it at login.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::error::Result;

pub trait CredentialHasher: Send + Sync {
    /// Turn a raw password into the material stored on the user record.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check a raw password against stored material. Malformed material is a
    /// mismatch, not an error.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Argon2id with a random per-password salt, stored as a PHC string.
#[derive(Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
        Ok(phc.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("stored credential is not a valid PHC string: {}", e);
                false
            }
        }
    }
}

/// Stores passwords as-is. Only for local development and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextHasher;

impl CredentialHasher for PlaintextHasher {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(password.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        password.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trip() {
        let hasher = Argon2Hasher::new();
        let stored = hasher.hash("hunter2").unwrap();

        assert!(stored.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &stored));
        assert!(!hasher.verify("hunter3", &stored));
    }

    #[test]
    fn argon2_salts_every_hash() {
        let hasher = Argon2Hasher::new();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn argon2_treats_garbage_as_mismatch() {
        assert!(!Argon2Hasher::new().verify("p", "not a phc string"));
    }

    #[test]
    fn plaintext_compares_exactly() {
        let stored = PlaintextHasher.hash("p").unwrap();
        assert!(PlaintextHasher.verify("p", &stored));
        assert!(!PlaintextHasher.verify("P", &stored));
        assert!(!PlaintextHasher.verify("pp", &stored));
    }
}
