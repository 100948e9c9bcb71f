/// SQLite-backed user store
use super::{User, UserStore};
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> AuthResult<User> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".to_string()))
    }
}

/// Map a unique-constraint failure on insert to the colliding field
fn map_insert_error(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("users.username") {
                return AuthError::AlreadyExists("username".to_string());
            }
            if message.contains("users.email") {
                return AuthError::AlreadyExists("email".to_string());
            }
            return AuthError::AlreadyExists("user".to_string());
        }
    }
    AuthError::Database(err)
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AuthResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".to_string()))
    }

    async fn get_by_username(&self, username: &str) -> AuthResult<User> {
        self.fetch_one_by("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> AuthResult<User> {
        self.fetch_one_by("email", email).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("user".to_string()));
        }

        Ok(())
    }
}
