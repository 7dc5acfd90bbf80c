//! Authentication routes
//!
//! Login issues an opaque session id in an HttpOnly cookie. Logout and
//! password changes clear it again.

use crate::auth::{is_well_formed, session_token, AuthUser};
use crate::config::SessionConfig;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use kummerkasten_shared::{ChangePasswordRequest, LoginRequest, UserProfile};

/// Create auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_profile))
        .route("/password", put(change_password))
}

/// `Set-Cookie` value carrying a session id
pub(crate) fn session_cookie(config: &SessionConfig, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, value, max_age_secs
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie
pub(crate) fn cleared_cookie(config: &SessionConfig) -> String {
    session_cookie(config, "", 0)
}

/// Login with email and password
///
/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (session, profile) = state
        .auth()
        .login(&req.email, &req.password, Utc::now())
        .await?;

    let cookie = session_cookie(
        &state.config().session,
        &session.id,
        state.auth().session_ttl().num_seconds(),
    );
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(profile)))
}

/// Drop the current session
///
/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    let config = &state.config().session;
    if let Some(token) = session_token(&headers, &config.cookie_name).filter(|t| is_well_formed(t)) {
        state.auth().logout(token).await?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, cleared_cookie(config))]),
    ))
}

/// Get current user profile
///
/// GET /api/v1/auth/me
async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<UserProfile>> {
    let profile = state.auth().get_profile(identity.user_id).await?;
    Ok(Json(profile))
}

/// Change the caller's password and end all of their sessions
///
/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth().change_password(&identity, req).await?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, cleared_cookie(&state.config().session))]),
    ))
}
