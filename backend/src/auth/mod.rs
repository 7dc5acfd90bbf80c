//! Authentication module
//!
//! Cookie sessions backed by the session store, with argon2 password
//! hashing (salt and pepper) and role checks.

pub mod gate;
mod password;
mod role;
mod sid;
mod touch;

pub use gate::{session_token, AuthGate, AuthUser, Authentication, Identity};
pub use password::{CredentialHasher, HashedCredential, Pepper, SALT_LEN};
pub use role::{require_role, require_self_or_admin};
pub use sid::{generate_session_id, is_well_formed, SESSION_ID_LEN};
pub use touch::SessionToucher;

#[cfg(test)]
pub(crate) use password::test_hasher;
