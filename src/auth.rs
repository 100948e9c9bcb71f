/// Authentication extractors
use crate::{
    account::SessionMetadata,
    api::middleware::{authorization_header, client_ip, device_from_user_agent},
    context::AppContext,
    error::AuthError,
    token::extract_bearer,
};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::{convert::Infallible, net::SocketAddr};
use uuid::Uuid;

/// Authenticated context - extracts and validates the access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(authorization_header(&parts.headers))?;
        let claims = state.account_manager.validate_token(token).await?;

        Ok(AuthContext {
            user_id: claims.user_id,
        })
    }
}

/// Descriptive metadata about the calling client
#[async_trait]
impl<S> FromRequestParts<S> for SessionMetadata
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let device_info = device_from_user_agent(user_agent.as_deref().unwrap_or_default());

        Ok(SessionMetadata {
            device_info: Some(device_info.to_string()),
            ip_address: client_ip(&parts.headers, peer),
            user_agent,
        })
    }
}
