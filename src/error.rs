/// Unified error types for the auth service
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;

/// Main error type for the service
///
/// Each variant is a failure *kind*; the kind survives unchanged from the
/// core up to the HTTP boundary, where `IntoResponse` maps it to a status.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown username or wrong password, deliberately indistinguishable
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Authenticated identity is not allowed to proceed (e.g. inactive account)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token signature is fine but its lifetime has passed
    #[error("Token has expired")]
    TokenExpired,

    /// Signature, class, issuer, unknown or revoked session
    #[error("Token is invalid: {reason}")]
    TokenInvalid { reason: String },

    #[error("Authorization token is missing")]
    TokenMissing,

    /// Username or email collision
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Malformed input, with per-field detail
    #[error("Validation failed: {message}")]
    ValidationFailed {
        message: String,
        details: BTreeMap<String, String>,
    },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },

    /// A dependency the service needs (the database) is unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Hashing, signing and other internal failures
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn token_invalid(reason: impl Into<String>) -> Self {
        AuthError::TokenInvalid {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::ValidationFailed {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid { .. } => "TOKEN_INVALID",
            AuthError::TokenMissing => "TOKEN_MISSING",
            AuthError::AlreadyExists(_) => "ALREADY_EXISTS",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::ValidationFailed { .. } => "VALIDATION_FAILED",
            AuthError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AuthError::Internal(_) | AuthError::Database(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Unauthorized(_)
            | AuthError::TokenExpired
            | AuthError::TokenInvalid { .. }
            | AuthError::TokenMissing => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            AuthError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to a client
    fn public_message(&self) -> String {
        match self {
            AuthError::Unauthorized(message) => message.clone(),
            AuthError::TokenInvalid { .. } => "Token is invalid".to_string(),
            AuthError::ValidationFailed { message, .. } => message.clone(),
            AuthError::RateLimitExceeded { .. } => {
                "Rate limit exceeded, please try again later".to_string()
            }
            AuthError::ServiceUnavailable(_) => "Service unavailable".to_string(),
            AuthError::Internal(_) | AuthError::Database(_) => {
                "Internal server error".to_string() // Don't leak details
            }
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<BTreeMap<String, String>> {
        match self {
            AuthError::TokenInvalid { reason } => {
                Some(BTreeMap::from([("reason".to_string(), reason.clone())]))
            }
            AuthError::ValidationFailed { details, .. } if !details.is_empty() => {
                Some(details.clone())
            }
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: BTreeMap<String, String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .collect();

        let message = details
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");

        AuthError::ValidationFailed { message, details }
    }
}

/// JSend `fail` body for client errors
#[derive(Debug, Serialize, Deserialize)]
pub struct FailResponse {
    pub status: String,
    pub data: FailData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// JSend `error` body for server errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub code: String,
}

/// Convert AuthError to HTTP response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let message = self.public_message();

        let mut response = if status.is_server_error() {
            tracing::error!(error = %self, "request failed with internal error");
            (
                status,
                Json(ErrorResponse {
                    status: "error".to_string(),
                    message,
                    code,
                }),
            )
                .into_response()
        } else {
            (
                status,
                Json(FailResponse {
                    status: "fail".to_string(),
                    data: FailData {
                        code,
                        message,
                        details: self.details(),
                    },
                }),
            )
                .into_response()
        };

        if let AuthError::RateLimitExceeded { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kinds_stay_distinct() {
        assert_eq!(AuthError::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(AuthError::token_invalid("wrong token type").code(), "TOKEN_INVALID");
        assert_eq!(AuthError::TokenMissing.code(), "TOKEN_MISSING");
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = AuthError::Internal("argon2 params rejected: m_cost".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AuthError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_token_invalid_carries_reason_detail() {
        let err = AuthError::token_invalid("token not found or revoked");
        let details = err.details().unwrap();
        assert_eq!(details.get("reason").unwrap(), "token not found or revoked");
        assert_eq!(err.public_message(), "Token is invalid");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AuthError::RateLimitExceeded {
            retry_after: Duration::from_secs(3),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "3");
    }
}
