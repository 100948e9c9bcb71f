/// Bearer token codec
///
/// Access and refresh tokens are compact HMAC-signed JWTs that differ only in
/// their `type` claim and signing secret. A token of one class never
/// validates as the other.
use crate::config::JwtConfig;
use crate::db::User;
use crate::error::{AuthError, AuthResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Token class, carried on the wire as the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenClass::Access => write!(f, "access"),
            TokenClass::Refresh => write!(f, "refresh"),
        }
    }
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "type")]
    pub token_class: TokenClass,
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
}

/// Freshly minted access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Why a token failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("malformed token or invalid signature")]
    Malformed,

    #[error("wrong token type: expected {expected}, got {got}")]
    WrongClass { expected: TokenClass, got: TokenClass },

    #[error("invalid token issuer")]
    WrongIssuer,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            other => AuthError::token_invalid(other.to_string()),
        }
    }
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

/// Signs and validates access and refresh tokens
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    issuer: String,
    algorithm: Algorithm,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from validated configuration
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        let lifetime = |d: std::time::Duration| {
            Duration::from_std(d)
                .map_err(|e| AuthError::Internal(format!("Token lifetime out of range: {}", e)))
        };

        let mut validation = Validation::new(config.algorithm);
        validation.algorithms = vec![config.algorithm];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        Ok(Self {
            access: ClassKeys {
                encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
                lifetime: lifetime(config.access_expiry)?,
            },
            refresh: ClassKeys {
                encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
                decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
                lifetime: lifetime(config.refresh_expiry)?,
            },
            issuer: config.issuer.clone(),
            algorithm: config.algorithm,
            validation,
        })
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Mint an access/refresh pair for a user
    ///
    /// Returns the refresh token's expiry alongside the pair so the caller
    /// can persist a matching session row.
    pub fn mint_pair(&self, user: &User) -> AuthResult<(TokenPair, DateTime<Utc>)> {
        let now = Utc::now();
        let (access_token, _) = self.mint(user, TokenClass::Access, now)?;
        let (refresh_token, refresh_expires_at) = self.mint(user, TokenClass::Refresh, now)?;

        Ok((
            TokenPair {
                access_token,
                refresh_token,
            },
            refresh_expires_at,
        ))
    }

    fn mint(
        &self,
        user: &User,
        class: TokenClass,
        now: DateTime<Utc>,
    ) -> AuthResult<(String, DateTime<Utc>)> {
        let keys = self.keys(class);
        let expires_at = now + keys.lifetime;

        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            token_class: class,
            sub: user.id.to_string(),
            iss: self.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: generate_jti(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign {} token: {}", class, e)))?;

        Ok((token, expires_at))
    }

    /// Validate a token as the expected class
    ///
    /// Checks run in order: signature and algorithm, then `exp`/`nbf`, then
    /// class, then issuer.
    pub fn validate(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                _ => TokenError::Malformed,
            })?;

        // jsonwebtoken still accepts a token during the second equal to `exp`
        let claims = data.claims;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.token_class != expected {
            return Err(TokenError::WrongClass {
                expected,
                got: claims.token_class,
            });
        }
        if claims.iss != self.issuer {
            return Err(TokenError::WrongIssuer);
        }

        Ok(claims)
    }
}

/// 32 random bytes, base64url
fn generate_jti() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: Option<&str>) -> AuthResult<&str> {
    let value = header.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(AuthError::TokenMissing);
    }

    if value.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::TokenMissing);
    }

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::token_invalid("invalid authorization header format"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::token_invalid("invalid authorization header format"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::TokenMissing);
    }

    Ok(token)
}
