//! In-memory user store

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::UserStore;
use crate::error::DbError;
use crate::models::{NewUser, User};

/// Volatile user store keyed by email
///
/// Owned by whoever constructs it; nothing here is process-global.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    by_email: HashMap<String, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.inner.read().by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut inner = self.inner.write();

        if inner.by_email.contains_key(&user.email) {
            return Err(DbError::Duplicate(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(created.email.clone(), created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        Ok(self.inner.read().by_email.get(email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        Ok(self
            .inner
            .read()
            .by_email
            .values()
            .find(|u| u.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: None,
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryUserStore::new();
        let a = store.create_user(new_user("a@b.com")).await.unwrap();
        let b = store.create_user(new_user("c@d.com")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_id(2).await.unwrap().unwrap().email, "c@d.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("a@b.com")).await.unwrap();

        let result = store.create_user(new_user("a@b.com")).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_independent() {
        let first = MemoryUserStore::new();
        let second = MemoryUserStore::new();
        first.create_user(new_user("a@b.com")).await.unwrap();

        assert!(first.exists_by_email("a@b.com").await.unwrap());
        assert!(!second.exists_by_email("a@b.com").await.unwrap());
    }
}
