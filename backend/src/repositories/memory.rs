//! In-process stores
//!
//! Used by the test suite and by `memory:` database URLs during local
//! development. List transactions work on a snapshot and commit with a
//! version check, so overlapping writers see `ConcurrentModification`
//! the way a serializable database would report a conflict.

use crate::auth::HashedCredential;
use crate::error::{ApiError, RepositionError};
use crate::repositories::qap::{PositionTx, QapRecord, QuestionAnswerStore};
use crate::repositories::session::{SessionRecord, SessionStore};
use crate::repositories::user::{NewUser, UserRecord, UserStore};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Sessions keyed by id
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn all(&self) -> Vec<SessionRecord> {
        self.sessions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &SessionRecord) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            bail!("duplicate session id");
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn touch(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.last_interaction = session.last_interaction.max(now);
        }
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_stale(&self, now: DateTime<Utc>, inactivity_window: Duration) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_stale_at(now, inactivity_window));
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

/// Users keyed by id, emails unique
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &NewUser) -> Result<UserRecord, ApiError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            role: user.role.as_str().to_string(),
            password_hash: user.credential.hash.clone(),
            salt: user.credential.salt.clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn update_credential(&self, id: Uuid, credential: &HashedCredential) -> Result<bool> {
        match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = credential.hash.clone();
                user.salt = credential.salt.clone();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
struct QapTable {
    version: u64,
    rows: BTreeMap<Uuid, QapRecord>,
}

/// Ordered question/answer list with snapshot transactions
#[derive(Clone, Default)]
pub struct MemoryQapStore {
    table: Arc<RwLock<QapTable>>,
}

impl MemoryQapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly, bypassing position bookkeeping
    pub async fn insert_raw(&self, record: QapRecord) {
        let mut table = self.table.write().await;
        table.rows.insert(record.id, record);
        table.version += 1;
    }
}

#[async_trait]
impl QuestionAnswerStore for MemoryQapStore {
    async fn begin(&self) -> Result<Box<dyn PositionTx>, RepositionError> {
        let table = self.table.read().await;
        Ok(Box::new(MemoryPositionTx {
            table: Arc::clone(&self.table),
            base_version: table.version,
            rows: table.rows.clone(),
            dirty: false,
        }))
    }

    async fn list(&self) -> Result<Vec<QapRecord>> {
        let table = self.table.read().await;
        let mut rows: Vec<QapRecord> = table.rows.values().cloned().collect();
        rows.sort_by_key(|r| r.position);
        Ok(rows)
    }
}

/// Snapshot of the list with pending writes
pub struct MemoryPositionTx {
    table: Arc<RwLock<QapTable>>,
    base_version: u64,
    rows: BTreeMap<Uuid, QapRecord>,
    dirty: bool,
}

impl MemoryPositionTx {
    /// Positions stay unique after every statement, like an eagerly
    /// checked unique index
    fn check_unique_positions(&self) -> Result<(), RepositionError> {
        let mut seen = HashSet::with_capacity(self.rows.len());
        for row in self.rows.values() {
            if !seen.insert(row.position) {
                debug!(position = row.position, "Position collision in list transaction");
                return Err(RepositionError::ConcurrentModification);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PositionTx for MemoryPositionTx {
    async fn count(&mut self) -> Result<i64, RepositionError> {
        Ok(self.rows.len() as i64)
    }

    async fn position_of(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError> {
        Ok(self.rows.get(&id).map(|r| r.position))
    }

    async fn shift_range(&mut self, from: i32, to: i32, delta: i32) -> Result<u64, RepositionError> {
        let mut affected = 0;
        for row in self.rows.values_mut() {
            if (from..=to).contains(&row.position) {
                row.position += delta;
                affected += 1;
            }
        }
        self.dirty = true;
        self.check_unique_positions()?;
        Ok(affected)
    }

    async fn set_position(&mut self, id: Uuid, position: i32) -> Result<u64, RepositionError> {
        let affected = match self.rows.get_mut(&id) {
            Some(row) => {
                row.position = position;
                1
            }
            None => 0,
        };
        self.dirty = true;
        self.check_unique_positions()?;
        Ok(affected)
    }

    async fn insert(
        &mut self,
        question: &str,
        answer: &str,
        position: i32,
    ) -> Result<QapRecord, RepositionError> {
        if self.rows.values().any(|r| r.question == question) {
            return Err(RepositionError::DuplicateQuestion);
        }

        let record = QapRecord {
            id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.to_string(),
            position,
        };
        self.rows.insert(record.id, record.clone());
        self.dirty = true;
        self.check_unique_positions()?;
        Ok(record)
    }

    async fn delete(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError> {
        let removed = self.rows.remove(&id).map(|r| r.position);
        self.dirty |= removed.is_some();
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositionError> {
        let MemoryPositionTx {
            table,
            base_version,
            rows,
            dirty,
        } = *self;
        if !dirty {
            return Ok(());
        }

        let mut table = table.write().await;
        if table.version != base_version {
            return Err(RepositionError::ConcurrentModification);
        }
        table.rows = rows;
        table.version += 1;
        Ok(())
    }
}
