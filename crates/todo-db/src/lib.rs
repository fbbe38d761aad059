//! Todo App user storage
//!
//! This crate provides the user record layer consumed by authentication:
//! a [`UserStore`] abstraction with a SQLite implementation via sqlx and
//! an in-memory implementation for tests and throwaway deployments.

pub mod error;
pub mod models;
pub mod store;

pub use error::DbError;
pub use models::{NewUser, User};
pub use store::{Database, MemoryUserStore, UserStore};

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
