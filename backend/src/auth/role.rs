//! Role checks for handlers
//!
//! Anonymous callers get 401; authenticated callers without the required
//! role get 403.

use crate::auth::gate::{Authentication, Identity};
use crate::error::ApiError;
use kummerkasten_shared::UserRole;
use uuid::Uuid;

/// Require a session whose role permits `required`
pub fn require_role(auth: &Authentication, required: UserRole) -> Result<&Identity, ApiError> {
    let identity = auth
        .identity()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if identity.role.permits(required) {
        Ok(identity)
    } else {
        Err(ApiError::Forbidden(format!("{} role required", required)))
    }
}

/// Require the owner of `user_id` or an admin
pub fn require_self_or_admin(auth: &Authentication, user_id: Uuid) -> Result<&Identity, ApiError> {
    let identity = auth
        .identity()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if identity.user_id == user_id || identity.role.is_admin() {
        Ok(identity)
    } else {
        Err(ApiError::Forbidden("Not allowed to act on this user".to_string()))
    }
}
