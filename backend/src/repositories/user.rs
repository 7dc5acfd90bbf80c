//! User repository for database operations

use crate::auth::HashedCredential;
use crate::error::ApiError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kummerkasten_shared::{UserProfile, UserRole};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

/// Unique constraint on the account email
const EMAIL_UNIQUE: &str = "users_email_key";

/// User record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: String,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Parsed role; unknown values fall back to the least privileged role
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or_else(|e| {
            warn!(user_id = %self.id, "{}", e);
            UserRole::User
        })
    }

    pub fn credential(&self) -> HashedCredential {
        HashedCredential {
            hash: self.password_hash.clone(),
            salt: self.salt.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            role: self.role(),
            created_at: self.created_at,
        }
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role: UserRole,
    pub credential: HashedCredential,
}

/// Account storage
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `ApiError::Conflict` when the email is taken
    async fn create(&self, user: &NewUser) -> Result<UserRecord, ApiError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Replace hash and salt together; returns false for unknown users
    async fn update_credential(&self, id: Uuid, credential: &HashedCredential) -> Result<bool>;

    /// Returns false for unknown users
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Postgres-backed user store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, ApiError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, firstname, lastname, role, password_hash, salt)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, firstname, lastname, role, password_hash, salt,
                      created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(user.role.as_str())
        .bind(&user.credential.hash)
        .bind(&user.credential.salt)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.constraint() == Some(EMAIL_UNIQUE) => {
                ApiError::Conflict("Email already registered".to_string())
            }
            _ => ApiError::Internal(e.into()),
        })?;

        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, firstname, lastname, role, password_hash, salt,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, firstname, lastname, role, password_hash, salt,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn update_credential(&self, id: Uuid, credential: &HashedCredential) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, salt = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&credential.hash)
        .bind(&credential.salt)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        // Sessions cascade through the foreign key
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            firstname: "Grace".to_string(),
            lastname: "Hopper".to_string(),
            role: role.to_string(),
            password_hash: "$argon2id$...".to_string(),
            salt: "c2FsdA".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(record("ADMIN").role(), UserRole::Admin);
        assert_eq!(record("USER").role(), UserRole::User);
        assert_eq!(record("superuser").role(), UserRole::User);
    }

    #[test]
    fn test_profile_does_not_carry_credentials() {
        let user = record("USER");
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains(&user.salt));
    }
}
