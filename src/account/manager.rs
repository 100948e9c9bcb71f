/// Session lifecycle orchestration
///
/// Composes the password hasher, token codec and the user/session stores.
/// Every successful register, login or refresh replaces the user's session,
/// so a user holds at most one live refresh session.

use crate::{
    account::{
        AuthResponse, LoginRequest, PasswordHasher, RegisterRequest, SessionMetadata, UserView,
    },
    config::ServerConfig,
    db::{Session, SessionStore, SqliteSessionStore, SqliteUserStore, User, UserStore},
    error::{AuthError, AuthResult},
    metrics,
    token::{Claims, TokenClass, TokenCodec, TokenPair},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const REVOKED_OR_UNKNOWN: &str = "token not found or revoked";

/// Account manager service
pub struct AccountManager {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
}

impl AccountManager {
    /// Create a new account manager backed by SQLite
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> AuthResult<Self> {
        Self::with_stores(
            Arc::new(SqliteUserStore::new(db.clone())),
            Arc::new(SqliteSessionStore::new(db)),
            &config,
        )
    }

    /// Create an account manager over arbitrary stores
    pub fn with_stores(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        config: &ServerConfig,
    ) -> AuthResult<Self> {
        Ok(Self {
            users,
            sessions,
            codec: TokenCodec::new(&config.jwt)?,
            hasher: PasswordHasher::new(&config.password)?,
        })
    }

    /// Register a new user and open their first session
    pub async fn register(
        &self,
        request: RegisterRequest,
        metadata: SessionMetadata,
    ) -> AuthResult<AuthResponse> {
        // Advisory checks; the unique constraints decide under races
        if exists(self.users.get_by_username(&request.username).await)? {
            metrics::record_auth_event("register", "conflict");
            return Err(AuthError::AlreadyExists("username".to_string()));
        }
        if exists(self.users.get_by_email(&request.email).await)? {
            metrics::record_auth_event("register", "conflict");
            return Err(AuthError::AlreadyExists("email".to_string()));
        }

        let password_hash = self.hasher.hash(request.password).await?;
        let user = User::new(request.username, request.email, password_hash, request.full_name);
        self.users.create(&user).await?;

        let tokens = self.open_session(&user, &metadata).await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        metrics::record_auth_event("register", "success");

        Ok(AuthResponse {
            user: UserView::from(&user),
            tokens,
        })
    }

    /// Authenticate credentials and replace the user's session
    pub async fn login(
        &self,
        request: LoginRequest,
        metadata: SessionMetadata,
    ) -> AuthResult<AuthResponse> {
        let user = match self.users.get_by_username(&request.username).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                debug!("Login failed: unknown username");
                metrics::record_auth_event("login", "invalid_credentials");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !self
            .hasher
            .verify(request.password, user.password_hash.clone())
            .await?
        {
            warn!(user_id = %user.id, "Login failed: invalid password");
            metrics::record_auth_event("login", "invalid_credentials");
            return Err(AuthError::InvalidCredentials);
        }

        // Only revealed to callers holding the right password
        if !user.is_active {
            warn!(user_id = %user.id, "Login rejected: account is inactive");
            metrics::record_auth_event("login", "inactive");
            return Err(AuthError::Unauthorized("account is inactive".to_string()));
        }

        let tokens = self.open_session(&user, &metadata).await?;

        info!(user_id = %user.id, "User logged in");
        metrics::record_auth_event("login", "success");

        Ok(AuthResponse {
            user: UserView::from(&user),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, revoking the old session
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        metadata: SessionMetadata,
    ) -> AuthResult<TokenPair> {
        let claims = self
            .codec
            .validate(refresh_token, TokenClass::Refresh)
            .map_err(|e| {
                debug!(error = %e, "Refresh token rejected by codec");
                metrics::record_auth_event("refresh", "invalid_token");
                AuthError::from(e)
            })?;

        let session = match self.sessions.get_by_refresh_token(refresh_token).await {
            Ok(session) => session,
            Err(AuthError::NotFound(_)) => {
                warn!(user_id = %claims.user_id, "Refresh token has no live session");
                metrics::record_auth_event("refresh", "invalid_token");
                return Err(AuthError::token_invalid(REVOKED_OR_UNKNOWN));
            }
            Err(e) => return Err(e),
        };

        if !session.is_valid() || session.user_id != claims.user_id {
            warn!(
                user_id = %session.user_id,
                session_id = %session.session_id,
                revoked = session.is_revoked,
                "Refresh token reuse rejected"
            );
            metrics::record_auth_event("refresh", "reuse");
            return Err(AuthError::token_invalid(REVOKED_OR_UNKNOWN));
        }

        let user = match self.users.get_by_id(session.user_id).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                warn!(user_id = %session.user_id, "Refresh token belongs to unknown user");
                return Err(AuthError::token_invalid("user not found"));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Refresh rejected: account is inactive");
            metrics::record_auth_event("refresh", "inactive");
            return Err(AuthError::Unauthorized("account is inactive".to_string()));
        }

        match self.sessions.revoke(session.session_id).await {
            Ok(()) => {}
            Err(AuthError::NotFound(_)) => {
                // Lost a race with another refresh of the same token
                warn!(
                    user_id = %user.id,
                    session_id = %session.session_id,
                    "Refresh token reuse rejected"
                );
                metrics::record_auth_event("refresh", "reuse");
                return Err(AuthError::token_invalid(REVOKED_OR_UNKNOWN));
            }
            Err(e) => {
                return Err(AuthError::Internal(format!(
                    "Failed to revoke session: {}",
                    e
                )))
            }
        }

        let tokens = self.open_session(&user, &metadata).await?;

        info!(user_id = %user.id, "Tokens refreshed");
        metrics::record_auth_event("refresh", "success");

        Ok(tokens)
    }

    /// Validate an access token and re-check the user is still active
    pub async fn validate_token(&self, access_token: &str) -> AuthResult<Claims> {
        let claims = self
            .codec
            .validate(access_token, TokenClass::Access)
            .map_err(|e| {
                debug!(error = %e, "Access token rejected");
                AuthError::from(e)
            })?;

        let user = match self.users.get_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                warn!(user_id = %claims.user_id, "Access token for unknown user");
                return Err(AuthError::token_invalid("user not found"));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Access token rejected: account is inactive");
            return Err(AuthError::Unauthorized("account is inactive".to_string()));
        }

        Ok(claims)
    }

    /// Revoke every session of the user
    pub async fn logout(&self, user_id: Uuid) -> AuthResult<()> {
        let revoked = self
            .sessions
            .revoke_all(user_id)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to logout: {}", e)))?;

        info!(user_id = %user_id, revoked, "User logged out");
        metrics::record_auth_event("logout", "success");

        Ok(())
    }

    /// Delete expired session rows
    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        let deleted = self.sessions.delete_expired().await?;
        if deleted > 0 {
            info!(deleted, "Expired sessions cleaned up");
        }
        Ok(deleted)
    }

    /// Fetch an active user
    pub async fn get_user(&self, user_id: Uuid) -> AuthResult<User> {
        let user = self.users.get_by_id(user_id).await?;
        if !user.is_active {
            return Err(AuthError::Unauthorized("account is inactive".to_string()));
        }
        Ok(user)
    }

    /// Fetch the user's live session, recording activity on it
    pub async fn current_session(&self, user_id: Uuid) -> AuthResult<Option<Session>> {
        let session = self.sessions.get_active_for_user(user_id).await?;

        if let Some(session) = &session {
            if let Err(e) = self.sessions.touch_last_activity(session.session_id).await {
                warn!(
                    session_id = %session.session_id,
                    error = %e,
                    "Failed to update session activity"
                );
            }
        }

        Ok(session)
    }

    /// Deactivate a user and revoke all of their sessions
    pub async fn deactivate_user(&self, user_id: Uuid) -> AuthResult<()> {
        self.users.set_active(user_id, false).await?;
        let revoked = self.sessions.revoke_all(user_id).await?;

        info!(user_id = %user_id, revoked, "User deactivated");
        Ok(())
    }

    /// Mint a pair and make it the user's only live session
    async fn open_session(&self, user: &User, metadata: &SessionMetadata) -> AuthResult<TokenPair> {
        let (tokens, expires_at) = self.codec.mint_pair(user)?;
        let session = Session::new(user.id, tokens.refresh_token.clone(), expires_at, metadata);

        self.sessions
            .replace_for_user(&session)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to store session: {}", e)))?;

        debug!(user_id = %user.id, session_id = %session.session_id, "Session opened");
        Ok(tokens)
    }
}

/// Turn a lookup into an existence check
fn exists<T>(lookup: AuthResult<T>) -> AuthResult<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(AuthError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
