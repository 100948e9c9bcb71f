use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::metrics;

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
    shutdown: watch::Receiver<bool>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>, shutdown: watch::Receiver<bool>) -> Self {
        Self { context, shutdown }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        info!("Starting background job scheduler");

        let handles = vec![
            tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self))),
            tokio::spawn(Self::rate_limiter_prune_job(Arc::clone(&self))),
            tokio::spawn(Self::health_check_job(Arc::clone(&self))),
        ];

        info!("Background jobs started");
        handles
    }

    /// Delete expired sessions; the first tick fires immediately
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.session.cleanup_interval;
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = scheduler.shutdown.clone();

        info!(interval_secs = period.as_secs(), "Session cleanup scheduled");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let started = Instant::now();
            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job(
                        "session_cleanup",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                    if count > 0 {
                        info!(deleted = count, "Cleaned up expired sessions");
                    }
                }
                Err(e) => {
                    metrics::record_background_job(
                        "session_cleanup",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                    error!("Failed to cleanup expired sessions: {}", e);
                }
            }
        }

        info!("Session cleanup stopped");
    }

    /// Drop idle rate limiter buckets (runs every 10 minutes)
    async fn rate_limiter_prune_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(600));
        let mut shutdown = scheduler.shutdown.clone();

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let tracked = tasks::prune_rate_limiter(&scheduler.context);
            tracing::debug!(tracked, "Pruned rate limiter state");
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));
        let mut shutdown = scheduler.shutdown.clone();

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            let started = Instant::now();
            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    metrics::record_background_job(
                        "health_check",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    metrics::record_background_job(
                        "health_check",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
