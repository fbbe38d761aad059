//! SQLite-backed user store

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::UserStore;
use crate::error::DbError;
use crate::models::{NewUser, User};

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create a private in-memory database
    ///
    /// Limited to a single connection: every SQLite `:memory:` connection
    /// opens its own empty database.
    pub async fn in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get the underlying pool for advanced usage
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[async_trait]
impl UserStore for Database {
    async fn create_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // The UNIQUE index decides, so concurrent inserts cannot both pass
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                DbError::Duplicate(format!("User with email '{}' already exists", user.email))
            } else {
                DbError::from(e)
            }
        })?;

        let id: i64 = result.get("id");
        debug!("Inserted user {} with id {}", user.email, id);

        Ok(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: Some("Test User".to_string()),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = Database::in_memory().await.unwrap();
        assert!(!db.has_users().await.unwrap());

        let created = db.create_user(new_user("x@y.com")).await.unwrap();
        assert!(db.has_users().await.unwrap());

        let by_email = db.find_by_email("x@y.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.name.as_deref(), Some("Test User"));

        let by_id = db.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "x@y.com");

        assert!(db.exists_by_email("x@y.com").await.unwrap());
        assert!(!db.exists_by_email("nobody@y.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.create_user(new_user("dup@y.com")).await.unwrap();

        let result = db.create_user(new_user("dup@y.com")).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("users.db").display());
        let db = Database::new(&url).await.unwrap();

        let (a, b) = tokio::join!(
            db.create_user(new_user("race@y.com")),
            db.create_user(new_user("race@y.com"))
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(DbError::Duplicate(_))))
        );
    }
}
