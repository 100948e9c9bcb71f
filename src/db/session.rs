/// SQLite-backed session store
use super::{Session, SessionStore};
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "session_id, user_id, refresh_token, device_info, ip_address, \
     user_agent, last_activity_at, expires_at, created_at, updated_at, is_revoked, revoked_at";

#[derive(Clone)]
pub struct SqliteSessionStore {
    db: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn replace_for_user(&self, session: &Session) -> AuthResult<()> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // First statement is a write so SQLite takes the write lock up front
        sqlx::query(
            r#"
            UPDATE sessions
            SET is_revoked = 1, revoked_at = ?, updated_at = ?
            WHERE user_id = ? AND is_revoked = 0
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(session.user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, user_id, refresh_token, device_info, ip_address, user_agent,
                last_activity_at, expires_at, created_at, updated_at, is_revoked, revoked_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.refresh_token)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.is_revoked)
        .bind(session.revoked_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = %session.user_id,
            session_id = %session.session_id,
            "Replaced user session"
        );

        Ok(())
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> AuthResult<Session> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE refresh_token = ? AND expires_at > ?",
            SESSION_COLUMNS
        );

        sqlx::query_as::<_, Session>(&sql)
            .bind(refresh_token)
            .bind(Utc::now())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AuthError::NotFound("session".to_string()))
    }

    async fn revoke(&self, session_id: Uuid) -> AuthResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_revoked = 1, revoked_at = ?, updated_at = ?
            WHERE session_id = ? AND is_revoked = 0
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(session_id)
        .execute(&self.db)
        .await?;

        // Zero rows means a concurrent caller already revoked it
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("session".to_string()));
        }

        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> AuthResult<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_revoked = 1, revoked_at = ?, updated_at = ?
            WHERE user_id = ? AND is_revoked = 0
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn touch_last_activity(&self, session_id: Uuid) -> AuthResult<()> {
        let now = Utc::now();
        sqlx::query("UPDATE sessions SET last_activity_at = ?, updated_at = ? WHERE session_id = ?")
            .bind(now)
            .bind(now)
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn get_active_for_user(&self, user_id: Uuid) -> AuthResult<Option<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE user_id = ? AND is_revoked = 0 AND expires_at > ?",
            SESSION_COLUMNS
        );

        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_optional(&self.db)
            .await?;

        Ok(session)
    }

    /// Counts non-revoked rows, expired or not
    async fn count_active_for_user(&self, user_id: Uuid) -> AuthResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ? AND is_revoked = 0")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        Ok(count)
    }
}
