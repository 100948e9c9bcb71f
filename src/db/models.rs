/// User and session records
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, password_hash: String, full_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            full_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Refresh session record in the database
///
/// `refresh_token` holds the exact signed token string handed to the client.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        user_id: Uuid,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        metadata: &SessionMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            refresh_token,
            device_info: metadata.device_info.clone(),
            ip_address: metadata.ip_address.clone(),
            user_agent: metadata.user_agent.clone(),
            last_activity_at: now,
            expires_at,
            created_at: now,
            updated_at: now,
            is_revoked: false,
            revoked_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        !self.is_revoked && !self.is_expired()
    }
}

/// Descriptive request metadata recorded on a session
///
/// Never used for authorization decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_validity() {
        let user_id = Uuid::new_v4();
        let meta = SessionMetadata::default();

        let live = Session::new(user_id, "r1".to_string(), Utc::now() + Duration::hours(1), &meta);
        assert!(live.is_valid());
        assert!(!live.is_expired());

        let expired = Session::new(user_id, "r2".to_string(), Utc::now() - Duration::seconds(1), &meta);
        assert!(expired.is_expired());
        assert!(!expired.is_valid());

        let mut revoked = live.clone();
        revoked.is_revoked = true;
        revoked.revoked_at = Some(Utc::now());
        assert!(!revoked.is_valid());
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            "Alice".to_string(),
        );
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }
}
