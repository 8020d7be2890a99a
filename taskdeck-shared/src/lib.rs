//! # TaskDeck Shared Library
//!
//! Domain types, persistence, authentication and the authorization gate used
//! by the TaskDeck API server.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool, migrations, pagination and soft-delete helpers
//! - `models`: Database models and their queries
//! - `auth`: Passwords, JWTs, refresh sessions and the authorization gate
//! - `services`: Transactional operations (gate, mutation and audit trail)

pub mod auth;
pub mod db;
pub mod models;
pub mod services;

/// Current version of the TaskDeck shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
