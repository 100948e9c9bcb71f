/// Account management system
///
/// Handles registration, authentication, token rotation and session
/// revocation.

mod manager;
pub mod password;

pub use crate::db::SessionMetadata;
pub use manager::AccountManager;
pub use password::PasswordHasher;

use crate::db::{Session, User};
use crate::token::{Claims, TokenPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Registration request
#[derive(Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,

    #[validate(length(min = 2, max = 100, message = "full_name must be between 2 and 100 characters"))]
    pub full_name: String,
}

/// Login request
#[derive(Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Token validation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValidateRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

/// Public view of a user, without credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// Register/login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub tokens: TokenPair,
}

/// Token validation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
}

/// Active session info (for /auth/me)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id,
            device_info: session.device_info.clone(),
            ip_address: session.ip_address.clone(),
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

/// Current user response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// 3-30 characters of letters, digits, underscores or hyphens
fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !(3..=30).contains(&len) || !charset_ok {
        return Err(invalid(
            "username",
            "username must be 3-30 characters and contain only letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(())
}

/// At least 8 characters with upper, lower, digit and special
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if !(long_enough && has_upper && has_lower && has_digit && has_special) {
        return Err(invalid(
            "password",
            "password must be at least 8 characters and contain uppercase, lowercase, number, and special character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    fn register(username: &str, email: &str, password: &str, full_name: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        let req = register("alice_01", "alice@example.com", "Secret123!", "Alice Example");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice@home").is_err());
        assert!(validate_username("al-ice_99").is_ok());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password_strength("Short1!").is_err());
        assert!(validate_password_strength("alllower123!").is_err());
        assert!(validate_password_strength("ALLUPPER123!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial123").is_err());
        assert!(validate_password_strength("Secret123!").is_ok());
    }

    #[test]
    fn test_errors_carry_field_details() {
        let req = register("a", "not-an-email", "weak", "A");
        let err: AuthError = req.validate().unwrap_err().into();

        match err {
            AuthError::ValidationFailed { details, .. } => {
                assert!(details.contains_key("username"));
                assert!(details.contains_key("email"));
                assert!(details.contains_key("password"));
                assert!(details.contains_key("full_name"));
                assert_eq!(details["email"], "email must be a valid email address");
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_tokens_rejected() {
        assert!(RefreshRequest {
            refresh_token: String::new()
        }
        .validate()
        .is_err());
        assert!(ValidateRequest {
            token: String::new()
        }
        .validate()
        .is_err());
    }
}
