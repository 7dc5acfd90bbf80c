//! Kummerkasten Backend Library
//!
//! Cookie-session authentication and the ordered FAQ list, exposed for
//! the binary and for integration tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
