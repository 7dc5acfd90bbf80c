//! Salted and peppered password hashing using argon2
//!
//! The hash input is `salt || password || pepper`. The salt is random per
//! user and stored next to the hash; the pepper lives only in process
//! configuration, so a database dump alone is not enough to attack hashes.
//!
//! # Performance Considerations
//!
//! Argon2 is intentionally CPU-intensive. In async contexts use the
//! `*_async` variants, which run on the blocking thread pool.

use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use kummerkasten_shared::AuthError;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Salt width in bytes
pub const SALT_LEN: usize = 16;

/// Argon2id memory cost in KiB
const MEMORY_COST_KIB: u32 = 19_456;
/// Argon2id iterations
const TIME_COST: u32 = 2;
/// Argon2id lanes
const PARALLELISM: u32 = 1;

/// Process-wide secret mixed into every password before hashing
pub struct Pepper(SecretString);

impl Pepper {
    /// Wrap a configured pepper. Empty values are refused.
    pub fn new(value: String) -> Result<Self, AuthError> {
        if value.is_empty() {
            return Err(AuthError::MissingPepper);
        }
        Ok(Self(SecretString::new(value)))
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }
}

impl fmt::Debug for Pepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pepper([REDACTED])")
    }
}

/// Stored credential: argon2 PHC string plus its base64 salt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedCredential {
    pub hash: String,
    pub salt: String,
}

struct HasherInner {
    pepper: Pepper,
    argon2: Argon2<'static>,
}

/// Credential hasher with an injected pepper
///
/// Cloning is cheap; the pepper and argon2 context are shared.
#[derive(Clone)]
pub struct CredentialHasher {
    inner: Arc<HasherInner>,
}

impl CredentialHasher {
    /// Argon2id with the fixed production cost
    pub fn new(pepper: Pepper) -> Result<Self, AuthError> {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .map_err(|e| AuthError::HashingFailure(e.to_string()))?;
        Ok(Self::with_params(pepper, params))
    }

    /// Argon2id with explicit cost parameters
    pub fn with_params(pepper: Pepper, params: Params) -> Self {
        Self {
            inner: Arc::new(HasherInner {
                pepper,
                argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            }),
        }
    }

    /// Hash a password with a freshly drawn salt (blocking operation)
    pub fn hash(&self, password: &str) -> Result<HashedCredential, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| AuthError::EntropySourceFailure(e.to_string()))?;
        self.hash_with_salt(password, &salt)
    }

    fn hash_with_salt(&self, password: &str, salt: &[u8]) -> Result<HashedCredential, AuthError> {
        let salt_string =
            SaltString::encode_b64(salt).map_err(|e| AuthError::HashingFailure(e.to_string()))?;
        let input = self.peppered(salt, password);
        let hash = self
            .inner
            .argon2
            .hash_password(&input, &salt_string)
            .map_err(|e| AuthError::HashingFailure(e.to_string()))?;

        Ok(HashedCredential {
            hash: hash.to_string(),
            salt: salt_string.as_str().to_string(),
        })
    }

    /// Verify a password against a stored credential (blocking operation)
    ///
    /// The digest comparison inside argon2 is constant-time.
    pub fn verify(&self, stored: &HashedCredential, password: &str) -> Result<(), AuthError> {
        if stored.salt.is_empty() {
            warn!("Stored credential has an empty salt");
            return Err(AuthError::InvalidCredential);
        }

        let salt = STANDARD_NO_PAD.decode(&stored.salt).map_err(|e| {
            warn!(error = %e, "Stored salt is not valid base64");
            AuthError::InvalidCredential
        })?;
        let parsed = PasswordHash::new(&stored.hash).map_err(|e| {
            warn!(error = %e, "Stored password hash is malformed");
            AuthError::InvalidCredential
        })?;

        let input = self.peppered(&salt, password);
        self.inner
            .argon2
            .verify_password(&input, &parsed)
            .map_err(|_| AuthError::InvalidCredential)
    }

    /// Spend one hash worth of work without producing anything
    ///
    /// Used when a login names an unknown account so its timing matches a
    /// wrong password.
    pub fn burn(&self, password: &str) {
        let _ = self.hash_with_salt(password, &[0u8; SALT_LEN]);
    }

    /// Hash a password on the blocking thread pool
    pub async fn hash_async(&self, password: String) -> Result<HashedCredential, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::HashingFailure(format!("Task join error: {}", e)))?
    }

    /// Verify a password on the blocking thread pool
    pub async fn verify_async(
        &self,
        stored: HashedCredential,
        password: String,
    ) -> Result<(), AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&stored, &password))
            .await
            .map_err(|e| AuthError::HashingFailure(format!("Task join error: {}", e)))?
    }

    /// Burn a hash on the blocking thread pool
    pub async fn burn_async(&self, password: String) {
        let hasher = self.clone();
        let _ = tokio::task::spawn_blocking(move || hasher.burn(&password)).await;
    }

    fn peppered(&self, salt: &[u8], password: &str) -> Vec<u8> {
        let pepper = self.inner.pepper.as_bytes();
        let mut input = Vec::with_capacity(salt.len() + password.len() + pepper.len());
        input.extend_from_slice(salt);
        input.extend_from_slice(password.as_bytes());
        input.extend_from_slice(pepper);
        input
    }
}

#[cfg(test)]
pub(crate) fn test_hasher(pepper: &str) -> CredentialHasher {
    // Minimal argon2 cost keeps the test suite fast
    let params = Params::new(1024, 1, 1, None).unwrap();
    CredentialHasher::with_params(Pepper::new(pepper.to_string()).unwrap(), params)
}
