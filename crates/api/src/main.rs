//! Printshop API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use printshop_common::config::AppConfig;
use printshop_common::db::{create_pool, migrate};
use printshop_common::redis_pool::create_redis_pool;
use printshop_mailer::ResendMailer;

use printshop_api::routes::create_router;
use printshop_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("printshop_api=debug,printshop_engine=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Printshop API server...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    migrate(&pool).await?;

    let redis = create_redis_pool(&config.redis_url).await?;

    let mailer = ResendMailer::new(&config.resend_api_url, config.resend_api_key.clone())?;
    if !mailer.is_configured() {
        tracing::warn!("RESEND_API_KEY is not set; email sends will be recorded as failed");
    }
    if config.cron_secret.is_none() && !config.cron_trust_platform_header {
        tracing::warn!("No cron authorization configured; the retry endpoint will reject every call");
    }

    let addr: SocketAddr = config
        .api_bind_addr
        .parse()
        .map_err(|_| anyhow::anyhow!("API_BIND_ADDR must be a socket address, e.g. 0.0.0.0:3000"))?;

    let state = AppState::new(pool, redis, mailer, config);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    Ok(())
}
