//! Login, logout and account management
//!
//! Password hashing and verification run on the blocking thread pool. Login
//! burns a hash for unknown emails so both failure paths cost the same.

use crate::auth::{CredentialHasher, Identity};
use crate::error::ApiError;
use crate::repositories::{NewUser, SessionRecord, SessionStore, UserStore};
use chrono::{DateTime, Duration, Utc};
use kummerkasten_shared::{
    AuthError, ChangePasswordRequest, CreateUserRequest, UserProfile, UserRole,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Account and session lifecycle service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: CredentialHasher,
    session_ttl: Duration,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn record_login(outcome: &'static str) {
    metrics::counter!("kummerkasten_logins_total", "outcome" => outcome).increment(1);
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: CredentialHasher,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Verify credentials and open a session
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(SessionRecord, UserProfile), ApiError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.burn_async(password.to_string()).await;
            debug!("Login attempt for unknown email");
            record_login("failure");
            return Err(AuthError::InvalidCredential.into());
        };

        if let Err(e) = self
            .hasher
            .verify_async(user.credential(), password.to_string())
            .await
        {
            if matches!(e, AuthError::InvalidCredential) {
                debug!(user_id = %user.id, "Login rejected");
                record_login("failure");
            } else {
                record_login("error");
            }
            return Err(e.into());
        }

        let session = SessionRecord::issue(user.id, self.session_ttl, now)?;
        self.sessions.create(&session).await?;

        record_login("success");
        info!(user_id = %user.id, "User logged in");

        Ok((session, user.profile()))
    }

    /// Invalidate a session; unknown tokens are ignored
    pub async fn logout(&self, session_id: &str) -> Result<(), ApiError> {
        self.sessions.invalidate(session_id).await?;
        Ok(())
    }

    /// Profile of the authenticated user
    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, ApiError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|user| user.profile())
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<UserProfile, ApiError> {
        req.validate()?;

        let email = normalize_email(&req.email);
        if self.users.email_exists(&email).await? {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }

        let credential = self.hasher.hash_async(req.password).await?;
        let user = self
            .users
            .create(&NewUser {
                email,
                firstname: req.firstname,
                lastname: req.lastname,
                role: req.role,
                credential,
            })
            .await?;

        info!(user_id = %user.id, role = %req.role, "User created");
        Ok(user.profile())
    }

    /// Change the caller's password
    ///
    /// A fresh salt is drawn and every session of the user is revoked,
    /// including the one making the request.
    pub async fn change_password(
        &self,
        identity: &Identity,
        req: ChangePasswordRequest,
    ) -> Result<u64, ApiError> {
        req.validate()?;

        let user = self
            .users
            .find_by_id(identity.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        self.hasher
            .verify_async(user.credential(), req.current_password)
            .await?;

        let credential = self.hasher.hash_async(req.new_password).await?;
        if !self.users.update_credential(user.id, &credential).await? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        let revoked = self.sessions.delete_for_user(user.id).await?;
        info!(user_id = %user.id, revoked, "Password changed");
        Ok(revoked)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        if !self.users.delete(user_id).await? {
            return Err(ApiError::NotFound("User not found".to_string()));
        }

        // The foreign key cascades in Postgres; the memory store needs it explicitly
        if let Err(e) = self.sessions.delete_for_user(user_id).await {
            warn!(error = %e, %user_id, "Failed to revoke sessions of deleted user");
        }

        info!(%user_id, "User deleted");
        Ok(())
    }

    /// Create the bootstrap admin unless the email is already taken
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, ApiError> {
        let email = normalize_email(email);
        if self.users.email_exists(&email).await? {
            debug!("Bootstrap admin already present");
            return Ok(false);
        }

        self.create_user(CreateUserRequest {
            email,
            firstname: "Admin".to_string(),
            lastname: "Kummerkasten".to_string(),
            password: password.to_string(),
            role: UserRole::Admin,
        })
        .await?;
        Ok(true)
    }
}
