//! Fixtures shared by unit and route tests

use crate::auth::test_hasher;
use crate::config::AppConfig;
use crate::repositories::{SessionRecord, SessionStore};
use crate::state::{AppState, Stores};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kummerkasten_shared::{CreateUserRequest, UserProfile, UserRole};
use uuid::Uuid;

pub(crate) const ADMIN_EMAIL: &str = "admin@example.com";
pub(crate) const ADMIN_PASSWORD: &str = "admin-password";
pub(crate) const USER_EMAIL: &str = "student@example.com";
pub(crate) const USER_PASSWORD: &str = "student-password";

/// Session store whose every call fails
pub(crate) struct BrokenSessionStore;

#[async_trait]
impl SessionStore for BrokenSessionStore {
    async fn create(&self, _session: &SessionRecord) -> Result<()> {
        bail!("store offline")
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<SessionRecord>> {
        bail!("store offline")
    }

    async fn touch(&self, _id: &str, _now: DateTime<Utc>) -> Result<()> {
        bail!("store offline")
    }

    async fn invalidate(&self, _id: &str) -> Result<()> {
        bail!("store offline")
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64> {
        bail!("store offline")
    }

    async fn delete_stale(&self, _now: DateTime<Utc>, _inactivity_window: Duration) -> Result<u64> {
        bail!("store offline")
    }

    async fn delete_for_user(&self, _user_id: Uuid) -> Result<u64> {
        bail!("store offline")
    }
}

/// Empty in-memory state with a cheap hasher
pub(crate) async fn memory_state() -> AppState {
    AppState::from_stores(
        None,
        Stores::in_memory(),
        AppConfig::default(),
        test_hasher("test-pepper-value"),
    )
}

/// In-memory state with one admin and one regular user
pub(crate) async fn seeded_state() -> (AppState, UserProfile, UserProfile) {
    let state = memory_state().await;
    let admin = create_user(&state, ADMIN_EMAIL, ADMIN_PASSWORD, UserRole::Admin).await;
    let user = create_user(&state, USER_EMAIL, USER_PASSWORD, UserRole::User).await;
    (state, admin, user)
}

pub(crate) async fn create_user(
    state: &AppState,
    email: &str,
    password: &str,
    role: UserRole,
) -> UserProfile {
    state
        .auth()
        .create_user(CreateUserRequest {
            email: email.to_string(),
            firstname: "Test".to_string(),
            lastname: "User".to_string(),
            password: password.to_string(),
            role,
        })
        .await
        .expect("seed user")
}

/// Session token for a fresh login
pub(crate) async fn login_token(state: &AppState, email: &str, password: &str) -> String {
    let (session, _) = state
        .auth()
        .login(email, password, Utc::now())
        .await
        .expect("seed login");
    session.id
}
