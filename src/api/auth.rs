/// Authentication endpoints (`/api/v1/auth/*`)
use crate::{
    account::{
        AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest, SessionInfo,
        SessionMetadata, UserView, ValidateRequest, ValidateResponse,
    },
    api::{Success, ValidatedJson},
    auth::AuthContext,
    context::AppContext,
    error::AuthResult,
    token::TokenPair,
};
use axum::{extract::State, routing::{get, post}, Router};
use serde_json::json;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/validate", post(validate))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// Register a new user
async fn register(
    State(ctx): State<AppContext>,
    metadata: SessionMetadata,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> AuthResult<Success<AuthResponse>> {
    let response = ctx.account_manager.register(request, metadata).await?;
    Ok(Success::created(response))
}

/// Log in with username and password
async fn login(
    State(ctx): State<AppContext>,
    metadata: SessionMetadata,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AuthResult<Success<AuthResponse>> {
    let response = ctx.account_manager.login(request, metadata).await?;
    Ok(Success::ok(response))
}

/// Rotate a refresh token
async fn refresh(
    State(ctx): State<AppContext>,
    metadata: SessionMetadata,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> AuthResult<Success<TokenPair>> {
    let tokens = ctx
        .account_manager
        .refresh_token(&request.refresh_token, metadata)
        .await?;
    Ok(Success::ok(tokens))
}

/// Validate an access token; failures are reported in the body
async fn validate(
    State(ctx): State<AppContext>,
    ValidatedJson(request): ValidatedJson<ValidateRequest>,
) -> Success<ValidateResponse> {
    let response = match ctx.account_manager.validate_token(&request.token).await {
        Ok(claims) => ValidateResponse {
            valid: true,
            claims: Some(claims),
        },
        Err(e) => {
            tracing::debug!(code = e.code(), "Token validation failed");
            ValidateResponse {
                valid: false,
                claims: None,
            }
        }
    };
    Success::ok(response)
}

/// Revoke all sessions of the caller
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AuthResult<Success<serde_json::Value>> {
    ctx.account_manager.logout(auth.user_id).await?;
    Ok(Success::ok(json!({ "message": "logged out successfully" })))
}

/// Current user and their live session
async fn me(State(ctx): State<AppContext>, auth: AuthContext) -> AuthResult<Success<MeResponse>> {
    let user = ctx.account_manager.get_user(auth.user_id).await?;
    let session = ctx.account_manager.current_session(auth.user_id).await?;

    Ok(Success::ok(MeResponse {
        user: UserView::from(&user),
        session: session.as_ref().map(SessionInfo::from),
    }))
}
