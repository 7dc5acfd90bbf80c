//! Database repositories
//!
//! Each store is a trait with a Postgres implementation; the in-memory
//! implementations in [`memory`] back the test suite and local runs.

pub mod memory;
pub mod qap;
pub mod session;
pub mod user;

pub use memory::{MemoryQapStore, MemorySessionStore, MemoryUserStore};
pub use qap::{PgQapStore, PositionTx, QapRecord, QuestionAnswerStore};
pub use session::{PgSessionStore, SessionRecord, SessionStore};
pub use user::{NewUser, PgUserStore, UserRecord, UserStore};
