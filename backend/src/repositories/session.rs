//! Session repository for database operations

use crate::auth::generate_session_id;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kummerkasten_shared::AuthError;
use sqlx::PgPool;
use uuid::Uuid;

/// Session record from database
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Mint a session for `user_id` that expires `ttl` after `now`
    pub fn issue(user_id: Uuid, ttl: Duration, now: DateTime<Utc>) -> Result<Self, AuthError> {
        Ok(Self {
            id: generate_session_id()?,
            user_id,
            expires_at: now + ttl,
            last_interaction: now,
            created_at: now,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>, inactivity_window: Duration) -> bool {
        self.last_interaction < now - inactivity_window
    }
}

/// Durable keyed store for sessions
///
/// Bulk deletes only match on time predicates, so they are safe to run
/// alongside session creation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a freshly issued session
    async fn create(&self, session: &SessionRecord) -> Result<()>;

    /// Point lookup by session id
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// Record an authenticated interaction
    async fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<()>;

    /// Delete a session; unknown ids are not an error
    async fn invalidate(&self, id: &str) -> Result<()>;

    /// Delete every session with `expires_at <= now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Delete every session idle for longer than `inactivity_window`
    async fn delete_stale(&self, now: DateTime<Utc>, inactivity_window: Duration) -> Result<u64>;

    /// Delete every session owned by `user_id`
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64>;
}

/// Postgres-backed session store
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &SessionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, last_interaction, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.last_interaction)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, expires_at, last_interaction, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET last_interaction = GREATEST(last_interaction, $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_stale(&self, now: DateTime<Utc>, inactivity_window: Duration) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_interaction < $1")
            .bind(now - inactivity_window)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_timestamps() {
        let now = Utc::now();
        let session = SessionRecord::issue(Uuid::new_v4(), Duration::hours(2), now).unwrap();

        assert_eq!(session.expires_at, now + Duration::hours(2));
        assert_eq!(session.last_interaction, now);
        assert!(crate::auth::is_well_formed(&session.id));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let session = SessionRecord::issue(Uuid::new_v4(), Duration::seconds(10), now).unwrap();

        assert!(!session.is_expired_at(now + Duration::seconds(9)));
        assert!(session.is_expired_at(now + Duration::seconds(10)));
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let session = SessionRecord::issue(Uuid::new_v4(), Duration::days(1), now).unwrap();

        assert!(!session.is_stale_at(now + Duration::minutes(59), Duration::hours(1)));
        assert!(session.is_stale_at(now + Duration::minutes(61), Duration::hours(1)));
    }
}
