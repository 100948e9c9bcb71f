/// Auth Locus - authentication service
///
/// Registers users, authenticates credentials, issues rotating access/refresh
/// token pairs and tracks one server-side session per user.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod metrics;
mod rate_limit;
mod server;
mod token;

use config::{LogFormat, LoggingConfig, ServerConfig};
use context::AppContext;
use error::AuthResult;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AuthResult<()> {
    // Load configuration (the log level and format live there)
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Start background jobs
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx), shutdown_rx));
    let jobs = scheduler.start();

    // Start server
    server::serve((*ctx).clone(), shutdown_tx).await?;

    for job in jobs {
        if let Err(e) = job.await {
            tracing::warn!(error = %e, "Background job ended abnormally");
        }
    }

    ctx.db.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("auth_locus={level},tower_http={level}", level = logging.level).into()
    });
    let json = logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn print_banner() {
    println!(
        r#"
    ___         __  __       __
   /   | __  __/ /_/ /_     / /   ____  _______  _______
  / /| |/ / / / __/ __ \   / /   / __ \/ ___/ / / / ___/
 / ___ / /_/ / /_/ / / /  / /___/ /_/ / /__/ /_/ (__  )
/_/  |_\__,_/\__/_/ /_/  /_____/\____/\___/\__,_/____/

        Authentication Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
