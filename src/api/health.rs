/// Health check endpoints for liveness and readiness probes
///
/// - Liveness: is the process alive and responsive?
/// - Readiness: can it serve traffic (database reachable)?

use crate::{
    api::Success,
    context::AppContext,
    db,
    error::{AuthError, AuthResult},
    metrics,
};
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use chrono::Utc;
use serde_json::json;

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
}

/// Basic health check
pub async fn health_basic() -> impl IntoResponse {
    Success::ok(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe
///
/// If we can respond, we're alive.
pub async fn liveness_probe() -> impl IntoResponse {
    Success::ok(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe
///
/// Returns a JSend 503 while the database is unreachable.
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> AuthResult<Success<serde_json::Value>> {
    if let Err(e) = db::test_connection(&ctx.db).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(AuthError::ServiceUnavailable("database unreachable".to_string()));
    }

    Ok(Success::ok(json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Prometheus metrics
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::render_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use crate::{config::ServerConfig, context::AppContext, server::build_router};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn ready_request() -> Request<Body> {
        Request::builder().uri("/health/ready").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_readiness_ok() {
        let ctx = AppContext::for_testing(ServerConfig::for_testing()).await;
        let response = build_router(ctx).oneshot(ready_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_reports_unreachable_database() {
        let ctx = AppContext::for_testing(ServerConfig::for_testing()).await;
        ctx.db.close().await;

        let response = build_router(ctx).oneshot(ready_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(json["message"], "Service unavailable");
    }
}
