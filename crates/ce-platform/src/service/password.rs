//! Password Service
//!
//! Argon2id hashing with per-password random salts. Verification returns
//! `Ok(false)` on mismatch so callers can collapse bad-email and bad-password
//! into one undifferentiated credential error.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{ApiError, Result};

#[derive(Default)]
pub struct PasswordService {
    argon: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ApiError::internal(format!("stored password hash is invalid: {}", e)))?;
        Ok(self
            .argon
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
