//! Race-free ordering of the question/answer list
//!
//! Positions are unique and checked on every statement, so a range cannot
//! be shifted by one in place: the row moving into a slot would collide
//! with the row still holding it. Every multi-row move therefore runs as an
//! offset dance inside one transaction:
//!
//! 1. lift the affected range out of `0..n` by adding `n`
//! 2. put the moved item on its target slot
//! 3. bring the lifted range back, one slot over
//!
//! Each phase checks the number of rows it touched. A mismatch means the
//! list changed underneath us; the transaction is dropped and the caller
//! gets [`RepositionError::ConcurrentModification`].

use crate::repositories::{PositionTx, QapRecord, QuestionAnswerStore};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::error::RepositionError;

/// Result of a successful reposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositionOutcome {
    Unchanged,
    Moved { from: i32, to: i32 },
}

/// Statements of one offset dance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPlan {
    /// Lowest position in the affected range
    pub lo: i32,
    /// Highest position in the affected range
    pub hi: i32,
    /// Distance the range is lifted in phase 1
    pub offset: i32,
    /// Distance the lifted range drops in phase 3
    pub settle: i32,
}

impl ShiftPlan {
    /// Plan moving the item at `current` to `target` in a list of `len`
    ///
    /// Returns `None` when nothing moves.
    pub fn new(current: i32, target: i32, len: i32) -> Option<Self> {
        if current == target {
            return None;
        }

        let plan = if target < current {
            // Moving earlier: [target, current) slides one slot later
            Self {
                lo: target,
                hi: current,
                offset: len,
                settle: len - 1,
            }
        } else {
            // Moving later: (current, target] slides one slot earlier
            Self {
                lo: current,
                hi: target,
                offset: len,
                settle: len + 1,
            }
        };
        Some(plan)
    }

    /// Rows phase 1 must lift; the moved item is among them
    pub fn lifted_rows(&self) -> u64 {
        (self.hi - self.lo + 1) as u64
    }

    /// Rows phase 3 must settle; the moved item has already left the range
    pub fn settled_rows(&self) -> u64 {
        (self.hi - self.lo) as u64
    }

    /// Final position of the item that started at `position`,
    /// the moved item excluded
    pub fn apply(&self, position: i32) -> i32 {
        if (self.lo..=self.hi).contains(&position) {
            position + self.offset - self.settle
        } else {
            position
        }
    }
}

fn expect_rows(phase: &str, expected: u64, actual: u64) -> Result<(), RepositionError> {
    if expected == actual {
        return Ok(());
    }
    warn!(phase, expected, actual, "Row count mismatch, list changed concurrently");
    Err(RepositionError::ConcurrentModification)
}

fn to_position(len: i64) -> Result<i32, RepositionError> {
    i32::try_from(len).map_err(|_| RepositionError::Store(anyhow::anyhow!("list too long: {}", len)))
}

/// Move `id` to `target` inside `tx`
///
/// Does not commit; dropping `tx` after an error rolls everything back.
pub async fn reposition_in(
    tx: &mut dyn PositionTx,
    id: Uuid,
    target: i32,
) -> Result<RepositionOutcome, RepositionError> {
    let current = tx
        .position_of(id)
        .await?
        .ok_or(RepositionError::ItemNotFound(id))?;

    let len = tx.count().await?;
    if target < 0 || i64::from(target) >= len {
        return Err(RepositionError::PositionOutOfRange {
            requested: target,
            len,
        });
    }

    let Some(plan) = ShiftPlan::new(current, target, to_position(len)?) else {
        return Ok(RepositionOutcome::Unchanged);
    };
    debug!(?plan, %id, "Repositioning");

    let lifted = tx.shift_range(plan.lo, plan.hi, plan.offset).await?;
    expect_rows("lift", plan.lifted_rows(), lifted)?;

    let placed = tx.set_position(id, target).await?;
    expect_rows("place", 1, placed)?;

    let settled = tx
        .shift_range(plan.lo + plan.offset, plan.hi + plan.offset, -plan.settle)
        .await?;
    expect_rows("settle", plan.settled_rows(), settled)?;

    Ok(RepositionOutcome::Moved {
        from: current,
        to: target,
    })
}

/// Delete `id` and close the gap it leaves
async fn remove_in(tx: &mut dyn PositionTx, id: Uuid) -> Result<i32, RepositionError> {
    let len = to_position(tx.count().await?)?;
    let removed = tx
        .delete(id)
        .await?
        .ok_or(RepositionError::ItemNotFound(id))?;

    let tail = len - 1 - removed;
    if tail > 0 {
        let lifted = tx.shift_range(removed + 1, len - 1, len).await?;
        expect_rows("lift", tail as u64, lifted)?;

        let settled = tx
            .shift_range(removed + 1 + len, 2 * len - 1, -(len + 1))
            .await?;
        expect_rows("settle", tail as u64, settled)?;
    }

    Ok(removed)
}

fn record_outcome<T>(result: &Result<T, RepositionError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(RepositionError::ConcurrentModification) => "conflict",
        Err(RepositionError::ItemNotFound(_)) => "not_found",
        Err(RepositionError::PositionOutOfRange { .. }) => "out_of_range",
        Err(RepositionError::DuplicateQuestion) => "duplicate",
        Err(RepositionError::Store(_)) => "error",
    };
    metrics::counter!("kummerkasten_repositions_total", "outcome" => outcome).increment(1);
}

/// Ordered-list service over a [`QuestionAnswerStore`]
#[derive(Clone)]
pub struct Repositioner {
    store: Arc<dyn QuestionAnswerStore>,
}

impl Repositioner {
    pub fn new(store: Arc<dyn QuestionAnswerStore>) -> Self {
        Self { store }
    }

    /// Move an item to `target`, shifting the items in between
    pub async fn reposition(
        &self,
        id: Uuid,
        target: i32,
    ) -> Result<RepositionOutcome, RepositionError> {
        let result = async {
            let mut tx = self.store.begin().await?;
            let outcome = reposition_in(tx.as_mut(), id, target).await?;
            tx.commit().await?;
            Ok::<_, RepositionError>(outcome)
        }
        .await;

        record_outcome(&result);
        if let Ok(RepositionOutcome::Moved { from, to }) = result {
            info!(%id, from, to, "Question/answer pair repositioned");
        }
        result
    }

    /// Add an item at the end of the list
    pub async fn append(&self, question: &str, answer: &str) -> Result<QapRecord, RepositionError> {
        let mut tx = self.store.begin().await?;
        let position = to_position(tx.count().await?)?;
        let record = tx.insert(question, answer, position).await?;
        tx.commit().await?;

        info!(id = %record.id, position, "Question/answer pair added");
        Ok(record)
    }

    /// Delete an item and renumber the ones after it
    pub async fn remove(&self, id: Uuid) -> Result<(), RepositionError> {
        let mut tx = self.store.begin().await?;
        let removed = remove_in(tx.as_mut(), id).await?;
        tx.commit().await?;

        info!(%id, position = removed, "Question/answer pair removed");
        Ok(())
    }

    /// All items ordered by position
    pub async fn list(&self) -> Result<Vec<QapRecord>, RepositionError> {
        Ok(self.store.list().await?)
    }
}
