/// HTTP server setup and routing
use crate::{
    api::middleware::track_metrics,
    context::AppContext,
    error::{AuthError, AuthResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::{future::IntoFuture, net::SocketAddr};
use tokio::sync::watch;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    with_layers(crate::api::routes(), ctx)
}

/// Wrap routes in the service-wide middleware stack
fn with_layers(routes: Router<AppContext>, ctx: AppContext) -> Router {
    let service = &ctx.config.service;
    let cors = cors_layer(&service.cors_allowed_origins);
    let max_body_bytes = service.max_body_bytes;
    let request_timeout = service.request_timeout;

    let router = routes
        // Route-level so MatchedPath is available for metric labels
        .route_layer(middleware::from_fn(track_metrics))
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout));

    with_security_headers(router)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")]);

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

fn with_security_headers(router: Router) -> Router {
    let headers = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (HeaderName::from_static("x-xss-protection"), "1; mode=block"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ),
        (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    ];

    headers.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

/// Turn a handler panic into a JSend `error` response
fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");

    error!(panic = %detail, "Request handler panicked");
    AuthError::Internal(format!("handler panicked: {}", detail)).into_response()
}

/// 404 handler
async fn not_found() -> Response {
    AuthError::NotFound("endpoint".to_string()).into_response()
}

/// Start the HTTP server
///
/// Runs until SIGINT/SIGTERM, then signals `shutdown` and drains in-flight
/// requests for at most the configured shutdown timeout.
pub async fn serve(ctx: AppContext, shutdown: watch::Sender<bool>) -> AuthResult<()> {
    let addr = ctx.config.bind_address();
    let shutdown_timeout = ctx.config.service.shutdown_timeout;

    info!("Auth service listening on {}", addr);
    info!("   Environment: {:?}", ctx.config.service.environment);

    let app = build_router(ctx);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AuthError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    let mut drain = shutdown.subscribe();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = drain.changed().await;
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => return server_result(result),
        _ = shutdown_signal() => {}
    }

    info!("Shutdown signal received, draining connections");
    let _ = shutdown.send(true);

    match tokio::time::timeout(shutdown_timeout, &mut server).await {
        Ok(result) => server_result(result),
        Err(_) => {
            warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> AuthResult<()> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(AuthError::Internal(format!("Server error: {}", e))),
        Err(e) => Err(AuthError::Internal(format!("Server task failed: {}", e))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn test_router(config: ServerConfig) -> Router {
        build_router(AppContext::for_testing(config).await)
    }

    #[tokio::test]
    async fn test_security_headers_and_request_id() {
        let app = test_router(ServerConfig::for_testing()).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("content-security-policy").unwrap(), "default-src 'self'");
        assert!(headers.get("strict-transport-security").is_some());
        assert!(headers.get("x-request-id").is_some(), "request id should be generated");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = test_router(ServerConfig::for_testing()).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
    }

    #[tokio::test]
    async fn test_unknown_route_is_jsend_fail() {
        let app = test_router(ServerConfig::for_testing()).await;

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["data"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_with_retry_after() {
        let mut config = ServerConfig::for_testing();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_minute = 1;
        config.rate_limit.burst_size = 1;
        let app = test_router(config).await;

        let request = || {
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().get("retry-after").is_some());

        let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["code"], "RATE_LIMIT_EXCEEDED");
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_jsend_error() {
        let ctx = AppContext::for_testing(ServerConfig::for_testing()).await;
        let app = with_layers(Router::new().route("/explode", axum::routing::get(explode)), ctx);

        let response = app
            .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-request-id").is_some());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_router(ServerConfig::for_testing()).await;

        let _ = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("http_requests_total"));
    }
}
