/// Database layer for the auth service
///
/// Manages the connection pool and migrations, and defines the store
/// contracts the account manager depends on. The SQLite implementations
/// live in `user` and `session`.

pub mod models;
pub mod session;
pub mod user;

pub use models::{Session, SessionMetadata, User};
pub use session::SqliteSessionStore;
pub use user::SqliteUserStore;

use crate::config::DatabaseConfig;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use uuid::Uuid;

/// Persistent record of refresh sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Revoke every live session for the user and insert `session`, atomically
    async fn replace_for_user(&self, session: &Session) -> AuthResult<()>;

    /// Look up an unexpired session by its exact refresh token string
    async fn get_by_refresh_token(&self, refresh_token: &str) -> AuthResult<Session>;

    async fn revoke(&self, session_id: Uuid) -> AuthResult<()>;

    /// Revoke all live sessions for a user, returning how many changed
    async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Hard-delete rows past their expiry, revoked or not
    async fn delete_expired(&self) -> AuthResult<u64>;

    async fn touch_last_activity(&self, session_id: Uuid) -> AuthResult<()>;

    async fn get_active_for_user(&self, user_id: Uuid) -> AuthResult<Option<Session>>;

    async fn count_active_for_user(&self, user_id: Uuid) -> AuthResult<i64>;
}

/// Persistent record of users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &User) -> AuthResult<()>;
    async fn get_by_id(&self, id: Uuid) -> AuthResult<User>;
    async fn get_by_username(&self, username: &str) -> AuthResult<User>;
    async fn get_by_email(&self, email: &str) -> AuthResult<User>;
    async fn set_active(&self, id: Uuid, active: bool) -> AuthResult<()>;
}

/// Create a SQLite connection pool
pub async fn create_pool(config: &DatabaseConfig) -> AuthResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AuthError::Internal(format!("Failed to create database directory: {}", e))
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run migrations
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> AuthResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AuthError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> AuthResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// In-memory database with the schema applied
///
/// A single connection that never idles out, so the database lives as
/// long as the pool.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_pool_creates_parent_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("auth.sqlite"),
            max_connections: 2,
        };

        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();

        assert!(config.path.exists(), "database file should be created");
    }
}
