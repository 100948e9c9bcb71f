/// Background task implementations
use crate::{context::AppContext, db, error::AuthResult, metrics};

/// Delete expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> AuthResult<u64> {
    let deleted = ctx.account_manager.cleanup_expired_sessions().await?;
    metrics::record_sessions_reaped(deleted);
    Ok(deleted)
}

/// Drop rate limiter state for idle clients, returning how many remain tracked
pub fn prune_rate_limiter(ctx: &AppContext) -> usize {
    ctx.rate_limiter.prune()
}

/// Health check - verify all systems are operational
pub async fn health_check(ctx: &AppContext) -> AuthResult<()> {
    db::test_connection(&ctx.db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_cleanup_with_nothing_expired() {
        let ctx = AppContext::for_testing(ServerConfig::for_testing()).await;
        assert_eq!(cleanup_expired_sessions(&ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let ctx = AppContext::for_testing(ServerConfig::for_testing()).await;
        assert!(health_check(&ctx).await.is_ok());

        ctx.db.close().await;
        assert!(health_check(&ctx).await.is_err());
    }
}
