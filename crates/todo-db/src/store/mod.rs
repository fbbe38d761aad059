//! User store abstraction and its implementations

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{NewUser, User};

mod memory;
mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::Database;

/// Lookup and creation of user records keyed by email
///
/// Handlers and the identity resolver receive an implementation by
/// construction (usually as `Arc<dyn UserStore>`).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user, failing with [`DbError::Duplicate`] when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, DbError>;

    /// Get a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    /// Get a user by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError>;

    /// Check whether an email is already registered
    async fn exists_by_email(&self, email: &str) -> Result<bool, DbError> {
        Ok(self.find_by_email(email).await?.is_some())
    }
}
