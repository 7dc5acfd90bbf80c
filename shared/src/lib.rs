//! Kummerkasten Shared Library
//!
//! Wire types, user roles and authentication outcomes shared between the
//! backend and API clients.

pub mod errors;
pub mod models;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use models::*;
pub use types::*;
