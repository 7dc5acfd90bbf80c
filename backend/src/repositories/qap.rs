//! Question/answer pair repository
//!
//! Positions are written only through a [`PositionTx`], which groups the
//! statements of one list mutation into a single serializable transaction.

use crate::error::RepositionError;
use anyhow::Result;
use async_trait::async_trait;
use kummerkasten_shared::QuestionAnswerPair;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Unique constraint on the question text
const QUESTION_UNIQUE: &str = "question_answer_pairs_question_key";

/// Question/answer pair record from database
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct QapRecord {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub position: i32,
}

impl From<QapRecord> for QuestionAnswerPair {
    fn from(record: QapRecord) -> Self {
        Self {
            id: record.id,
            question: record.question,
            answer: record.answer,
            position: record.position,
        }
    }
}

/// Statements available inside one list transaction
///
/// Dropping the transaction without calling [`PositionTx::commit`] rolls
/// every statement back.
#[async_trait]
pub trait PositionTx: Send {
    async fn count(&mut self) -> Result<i64, RepositionError>;

    /// Current position of `id`, locking the row
    async fn position_of(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError>;

    /// Add `delta` to every position in `from..=to`; returns affected rows
    async fn shift_range(&mut self, from: i32, to: i32, delta: i32) -> Result<u64, RepositionError>;

    /// Returns affected rows
    async fn set_position(&mut self, id: Uuid, position: i32) -> Result<u64, RepositionError>;

    async fn insert(
        &mut self,
        question: &str,
        answer: &str,
        position: i32,
    ) -> Result<QapRecord, RepositionError>;

    /// Delete `id`, returning the position it held
    async fn delete(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositionError>;
}

/// Storage for the ordered question/answer list
#[async_trait]
pub trait QuestionAnswerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn PositionTx>, RepositionError>;

    /// All pairs ordered by position
    async fn list(&self) -> Result<Vec<QapRecord>>;
}

/// Postgres-backed question/answer store
#[derive(Clone)]
pub struct PgQapStore {
    pool: PgPool,
}

impl PgQapStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map driver errors onto list outcomes
///
/// Serialization failures, deadlocks and position collisions all mean a
/// concurrent writer got there first.
fn classify(err: sqlx::Error) -> RepositionError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(QUESTION_UNIQUE) {
            return RepositionError::DuplicateQuestion;
        }
        if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01") | Some("23505")) {
            return RepositionError::ConcurrentModification;
        }
    }
    RepositionError::Store(err.into())
}

#[async_trait]
impl QuestionAnswerStore for PgQapStore {
    async fn begin(&self) -> Result<Box<dyn PositionTx>, RepositionError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(Box::new(PgPositionTx { tx }))
    }

    async fn list(&self) -> Result<Vec<QapRecord>> {
        let records = sqlx::query_as::<_, QapRecord>(
            r#"
            SELECT id, question, answer, position
            FROM question_answer_pairs
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Serializable Postgres transaction over `question_answer_pairs`
pub struct PgPositionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PositionTx for PgPositionTx {
    async fn count(&mut self) -> Result<i64, RepositionError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM question_answer_pairs")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(classify)
    }

    async fn position_of(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT position FROM question_answer_pairs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn shift_range(&mut self, from: i32, to: i32, delta: i32) -> Result<u64, RepositionError> {
        let result = sqlx::query(
            r#"
            UPDATE question_answer_pairs
            SET position = position + $3
            WHERE position BETWEEN $1 AND $2
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn set_position(&mut self, id: Uuid, position: i32) -> Result<u64, RepositionError> {
        let result = sqlx::query("UPDATE question_answer_pairs SET position = $2 WHERE id = $1")
            .bind(id)
            .bind(position)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;

        Ok(result.rows_affected())
    }

    async fn insert(
        &mut self,
        question: &str,
        answer: &str,
        position: i32,
    ) -> Result<QapRecord, RepositionError> {
        sqlx::query_as::<_, QapRecord>(
            r#"
            INSERT INTO question_answer_pairs (question, answer, position)
            VALUES ($1, $2, $3)
            RETURNING id, question, answer, position
            "#,
        )
        .bind(question)
        .bind(answer)
        .bind(position)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn delete(&mut self, id: Uuid) -> Result<Option<i32>, RepositionError> {
        sqlx::query_scalar::<_, i32>(
            "DELETE FROM question_answer_pairs WHERE id = $1 RETURNING position",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositionError> {
        self.tx.commit().await.map_err(classify)
    }
}
