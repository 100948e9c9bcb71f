/// Per-client rate limiting
use crate::{
    api::middleware::client_ip,
    config::RateLimitConfig,
    context::AppContext,
    error::{AuthError, AuthResult},
    metrics,
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_minute);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: Arc::new(DefaultKeyedRateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
            enabled: config.enabled,
        }
    }

    /// Check the limit for one client
    pub fn check(&self, client: IpAddr) -> AuthResult<()> {
        if !self.enabled {
            return Ok(());
        }

        self.limiter.check_key(&client).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            AuthError::RateLimitExceeded {
                retry_after: wait.max(Duration::from_secs(1)),
            }
        })
    }

    /// Forget clients whose buckets have fully refilled
    pub fn prune(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let client = client_ip(request.headers(), peer)
        .and_then(|ip| ip.parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if let Err(e) = ctx.rate_limiter.check(client) {
        tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_minute: u32, burst_size: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_minute,
            burst_size,
        }
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&config(60, 5));
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        // Should allow burst requests
        for _ in 0..5 {
            assert!(limiter.check(client).is_ok());
        }

        // Should hit rate limit after burst
        match limiter.check(client) {
            Err(AuthError::RateLimitExceeded { retry_after }) => {
                assert!(retry_after >= Duration::from_secs(1));
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(&config(60, 1));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_err());
        assert!(limiter.check(b).is_ok(), "one client must not exhaust another's quota");
    }

    #[test]
    fn test_disabled_limiter_allows_everything() {
        let mut cfg = config(1, 1);
        cfg.enabled = false;
        let limiter = RateLimiter::new(&cfg);
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..10 {
            assert!(limiter.check(client).is_ok());
        }
    }
}
