use argon2::Argon2;

use super::token::{argon2, hash_secret, verify_secret};
use crate::error::Result;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2id password hashing; hashes are PHC strings with an embedded salt.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        Self { argon2: argon2() }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        hash_secret(&self.argon2, password.as_bytes())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        verify_secret(&self.argon2, password.as_bytes(), hash)
    }
}
