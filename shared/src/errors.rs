//! Error types for authentication outcomes

use thiserror::Error;

/// Authentication and credential errors
///
/// `InvalidCredential` is an expected outcome of a failed login and is never
/// treated as a system error. The remaining variants mean the process cannot
/// issue or check credentials safely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Entropy source failure: {0}")]
    EntropySourceFailure(String),

    #[error("Pepper is not configured")]
    MissingPepper,
}

impl AuthError {
    /// Whether this error means the process itself is misconfigured or broken
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AuthError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_is_not_fatal() {
        assert!(!AuthError::InvalidCredential.is_fatal());
        assert!(AuthError::MissingPepper.is_fatal());
        assert!(AuthError::EntropySourceFailure("getrandom".into()).is_fatal());
    }
}
