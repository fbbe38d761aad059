//! Identity lookup for verified subjects

use async_trait::async_trait;
use std::sync::Arc;
use todo_db::UserStore;
use tracing::debug;

use crate::error::AuthError;
use crate::principal::Authority;

/// Identity record behind a token subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub name: Option<String>,
    /// Granted capabilities; empty means baseline only
    pub authorities: Vec<Authority>,
}

/// Maps a subject to its identity record
///
/// Implementations report unknown subjects as [`AuthError::UserNotFound`]
/// and lookup failures as [`AuthError::ResolverUnavailable`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, subject: &str) -> Result<Identity, AuthError>;
}

/// Resolver backed by the user store, keyed by email
#[derive(Clone)]
pub struct StoreResolver {
    store: Arc<dyn UserStore>,
}

impl StoreResolver {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityResolver for StoreResolver {
    async fn resolve(&self, subject: &str) -> Result<Identity, AuthError> {
        let user = self
            .store
            .find_by_email(subject)
            .await
            .map_err(|e| AuthError::ResolverUnavailable(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        debug!("Resolved identity for {}", subject);

        Ok(Identity {
            subject: user.email,
            name: user.name,
            // Users carry no role column; everyone gets the baseline role
            authorities: vec![Authority::baseline()],
        })
    }
}
