//! Opaque session identifiers
//!
//! A session id is 18 bytes from the OS random source encoded as URL-safe
//! base64 without padding: 24 printable characters carrying 144 bits of
//! entropy. The encoded form is never truncated.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use kummerkasten_shared::AuthError;

/// Random bytes drawn per session id
pub const SESSION_ID_BYTES: usize = 18;

/// Length of the encoded session id
pub const SESSION_ID_LEN: usize = SESSION_ID_BYTES / 3 * 4;

/// Mint a new session id
///
/// Fails when the OS random source errors; there is no weaker fallback.
pub fn generate_session_id() -> Result<String, AuthError> {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::EntropySourceFailure(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Structural check applied before any store lookup
pub fn is_well_formed(token: &str) -> bool {
    token.len() == SESSION_ID_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
