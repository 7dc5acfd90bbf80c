//! User administration routes
//!
//! Creating and deleting accounts is admin only; a profile can be read by
//! its owner or an admin.

use crate::auth::{require_role, require_self_or_admin, Authentication};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use kummerkasten_shared::{CreateUserRequest, UserProfile, UserRole};
use uuid::Uuid;

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/:id", get(get_user).delete(delete_user))
}

/// POST /api/v1/users
async fn create_user(
    State(state): State<AppState>,
    auth: Authentication,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    require_role(&auth, UserRole::Admin)?;

    let profile = state.auth().create_user(req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/users/:id
async fn get_user(
    State(state): State<AppState>,
    auth: Authentication,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    require_self_or_admin(&auth, id)?;

    let profile = state.auth().get_profile(id).await?;
    Ok(Json(profile))
}

/// DELETE /api/v1/users/:id
///
/// The user's sessions go with it.
async fn delete_user(
    State(state): State<AppState>,
    auth: Authentication,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&auth, UserRole::Admin)?;

    state.auth().delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
