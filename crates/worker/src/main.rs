//! In-process email retry worker.
//!
//! Runs the same retry pass as `GET /api/cron/retry-email-deliveries` on a
//! fixed tick, for deployments without an external cron trigger.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use printshop_common::config::AppConfig;
use printshop_common::db;
use printshop_common::redis_pool::create_redis_pool;
use printshop_engine::notify::PgNotifier;
use printshop_engine::retry::PgRetryScheduler;
use printshop_mailer::ResendMailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printshop_worker=info,printshop_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("Printshop retry worker starting...");

    let config = AppConfig::from_env()?;

    if !config.email_retry_enabled {
        tracing::info!("EMAIL_RETRY_ENABLED is off; nothing to do");
        return Ok(());
    }

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;

    let redis = create_redis_pool(&config.redis_url).await?;
    let mailer = ResendMailer::new(&config.resend_api_url, config.resend_api_key.clone())?;

    let notifier = PgNotifier::from_config(pool, redis, mailer, &config);
    let scheduler = PgRetryScheduler::new(notifier, config.email_retry_batch_size);

    let interval_secs = config.worker_interval_seconds.max(1);
    tracing::info!(interval_secs, "Starting email retry loop");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Received shutdown signal, stopping after the current pass...");
    };

    let scheduler = &scheduler;
    run_loop(Duration::from_secs(interval_secs), shutdown, move || async move {
        if let Err(e) = scheduler.run(Utc::now()).await {
            tracing::error!(error = %e, "Email retry pass failed");
        }
    })
    .await;

    tracing::info!("Printshop retry worker stopped.");
    Ok(())
}

/// Run `pass` on every tick until `shutdown` resolves.
///
/// Shutdown is only observed between passes; a pass in progress always finishes.
async fn run_loop<P, F>(every: Duration, shutdown: impl Future<Output = ()>, mut pass: P)
where
    P: FnMut() -> F,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        pass().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_shutdown_waits_for_running_pass() {
        let started = Arc::new(Notify::new());
        let finished = Arc::new(AtomicUsize::new(0));
        let passes = Arc::new(AtomicUsize::new(0));

        let shutdown = {
            let started = started.clone();
            async move { started.notified().await }
        };

        run_loop(Duration::from_millis(1), shutdown, || {
            let started = started.clone();
            let finished = finished.clone();
            let passes = passes.clone();
            async move {
                passes.fetch_add(1, Ordering::SeqCst);
                // Shutdown fires while this pass is mid-flight.
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_keeps_ticking_until_shutdown() {
        let passes = Arc::new(AtomicUsize::new(0));
        let shutdown = tokio::time::sleep(Duration::from_millis(50));

        run_loop(Duration::from_millis(5), shutdown, || {
            let passes = passes.clone();
            async move {
                passes.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(passes.load(Ordering::SeqCst) >= 2);
    }
}
