//! Shared application state for the Axum API server.

use printshop_common::config::AppConfig;
use printshop_engine::notify::PgNotifier;
use printshop_engine::retry::PgRetryScheduler;
use printshop_mailer::ResendMailer;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub mailer: ResendMailer,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        mailer: ResendMailer,
        config: AppConfig,
    ) -> Self {
        Self {
            pool,
            redis,
            mailer,
            config,
        }
    }

    pub fn notifier(&self) -> PgNotifier {
        PgNotifier::from_config(
            self.pool.clone(),
            self.redis.clone(),
            self.mailer.clone(),
            &self.config,
        )
    }

    pub fn retry_scheduler(&self) -> PgRetryScheduler {
        PgRetryScheduler::new(self.notifier(), self.config.email_retry_batch_size)
    }
}
