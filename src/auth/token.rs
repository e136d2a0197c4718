use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Token;

const ARGON2_MEMORY: u32 = 64 * 1024; // 64KB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "sakip";
const LOOKUP_LENGTH: usize = 8;
const SECRET_BYTES: usize = 12;
const MAX_RETRIES: u32 = 3;

/// Argon2id with the parameters shared by tokens and passwords.
pub(super) fn argon2() -> Argon2<'static> {
    let params = Params::new(
        ARGON2_MEMORY,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(ARGON2_OUTPUT_LEN),
    )
    .unwrap_or_default();

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

pub(super) fn hash_secret(argon2: &Argon2<'_>, secret: &[u8]) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(secret, &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Config(format!("failed to hash secret: {e}")))
}

pub(super) fn verify_secret(argon2: &Argon2<'_>, secret: &[u8], hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

    match argon2.verify_password(secret, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Config(format!("failed to verify secret: {e}"))),
    }
}

/// A freshly minted token. `raw` is shown to the caller once and never stored.
#[derive(Debug)]
pub struct IssuedToken {
    pub raw: String,
    pub lookup: String,
    pub hash: String,
}

pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self { argon2: argon2() }
    }

    /// Mints `sakip_<lookup>_<secret>`: an 8 character lookup key and a
    /// 24 character hex secret.
    pub fn generate(&self) -> Result<IssuedToken> {
        let lookup = uuid::Uuid::new_v4().simple().to_string()[..LOOKUP_LENGTH].to_string();

        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill(&mut bytes);
        let secret = hex::encode(bytes);

        let raw = format!("{TOKEN_PREFIX}_{lookup}_{secret}");
        let hash = hash_secret(&self.argon2, raw.as_bytes())?;

        Ok(IssuedToken { raw, lookup, hash })
    }

    pub fn verify(&self, raw: &str, hash: &str) -> Result<bool> {
        verify_secret(&self.argon2, raw.as_bytes(), hash)
    }

    /// Mints a token for `user_id` and stores it, retrying on the rare
    /// lookup-key collision. Returns the stored row and the raw token.
    pub fn issue(
        &self,
        store: &dyn Store,
        user_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(Token, String)> {
        for _ in 0..MAX_RETRIES {
            let issued = self.generate()?;
            let token = Token {
                id: uuid::Uuid::new_v4().to_string(),
                token_hash: issued.hash,
                token_lookup: issued.lookup,
                user_id: user_id.to_string(),
                created_at: Utc::now(),
                expires_at,
                last_used_at: None,
            };

            match store.create_token(&token) {
                Ok(()) => return Ok((token, issued.raw)),
                Err(Error::TokenLookupCollision) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::TokenLookupCollision)
    }
}

/// Splits a raw token into its lookup key and secret.
pub fn parse_token(token: &str) -> Result<(&str, &str)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH
        || secret.len() != SECRET_BYTES * 2
        || !secret.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup, secret))
}
