//! Per-request authentication gate
//!
//! The gate reads the session cookie and classifies the request as
//! anonymous or authenticated. It never rejects a request by itself;
//! handlers receive the [`Authentication`] value as a parameter and decide.

use crate::auth::sid::is_well_formed;
use crate::auth::touch::SessionToucher;
use crate::error::ApiError;
use crate::repositories::{SessionStore, UserStore};
use crate::state::AppState;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};
use kummerkasten_shared::UserRole;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Resolved owner of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub session_id: String,
}

/// Outcome of the gate for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Anonymous,
    Authenticated(Identity),
}

impl Authentication {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Authentication::Anonymous => None,
            Authentication::Authenticated(identity) => Some(identity),
        }
    }
}

/// Session-cookie authentication
#[derive(Clone)]
pub struct AuthGate {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    toucher: SessionToucher,
    cookie_name: Arc<str>,
}

impl AuthGate {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        toucher: SessionToucher,
        cookie_name: &str,
    ) -> Self {
        Self {
            sessions,
            users,
            toucher,
            cookie_name: Arc::from(cookie_name),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Classify a request token at the current time
    pub async fn authenticate(&self, token: Option<&str>) -> Authentication {
        self.authenticate_at(token, Utc::now()).await
    }

    /// Classify a request token at `now`
    pub async fn authenticate_at(&self, token: Option<&str>, now: DateTime<Utc>) -> Authentication {
        let token = match token {
            Some(token) if is_well_formed(token) => token,
            Some(_) => {
                debug!("Ignoring malformed session token");
                return Authentication::Anonymous;
            }
            None => return Authentication::Anonymous,
        };

        let session = match self.sessions.find_by_id(token).await {
            Ok(Some(session)) => session,
            Ok(None) => return Authentication::Anonymous,
            Err(e) => {
                warn!(error = %e, "Session lookup failed, treating request as anonymous");
                return Authentication::Anonymous;
            }
        };

        if session.is_expired_at(now) {
            if let Err(e) = self.sessions.invalidate(&session.id).await {
                warn!(error = %e, user_id = %session.user_id, "Failed to delete expired session");
            }
            return Authentication::Anonymous;
        }

        let user = match self.users.find_by_id(session.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %session.user_id, "Session refers to a missing user");
                return Authentication::Anonymous;
            }
            Err(e) => {
                warn!(error = %e, "User lookup failed, treating request as anonymous");
                return Authentication::Anonymous;
            }
        };

        self.toucher.dispatch(&session.id, now);

        Authentication::Authenticated(Identity {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role(),
            session_id: session.id,
        })
    }
}

/// Value of the named cookie across all `Cookie` headers
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authentication
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let gate = app_state.gate();
        let token = session_token(&parts.headers, gate.cookie_name());

        Ok(gate.authenticate(token).await)
    }
}

/// Authenticated user extracted from the session cookie
///
/// Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Authentication::from_request_parts(parts, state).await {
            Ok(Authentication::Authenticated(identity)) => Ok(AuthUser(identity)),
            Ok(Authentication::Anonymous) => Err(ApiError::Unauthorized(
                "Authentication required".to_string(),
            )),
            Err(never) => match never {},
        }
    }
}
