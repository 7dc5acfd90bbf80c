//! Business logic services
//!
//! Services encapsulate business logic and coordinate between
//! repositories and the HTTP layer.

pub mod auth;
pub mod ordering;

pub use auth::AuthService;
pub use ordering::{reposition_in, RepositionOutcome, Repositioner, ShiftPlan};
