/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::AuthResult,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AuthResult<Self> {
        // Validate configuration
        config.validate()?;

        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        tracing::info!(path = %config.database.path.display(), "Database ready");

        Self::with_pool(config, db)
    }

    /// Build the context over an existing pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> AuthResult<Self> {
        let config = Arc::new(config);
        let account_manager = Arc::new(AccountManager::new(db.clone(), config.clone())?);
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config,
            db,
            account_manager,
            rate_limiter,
        })
    }

    /// Context over a fresh in-memory database
    #[cfg(test)]
    pub async fn for_testing(config: ServerConfig) -> Self {
        Self::with_pool(config, db::test_pool().await).unwrap()
    }
}
