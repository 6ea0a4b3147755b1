//! Cron-triggered background jobs.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use printshop_common::error::AppError;

use crate::middleware::cron::CronAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/cron/retry-email-deliveries",
        get(retry_email_deliveries),
    )
}

/// GET /api/cron/retry-email-deliveries: Run one email retry pass.
///
/// With `EMAIL_RETRY_ENABLED` off this returns `{"disabled": true}` without
/// touching the database.
async fn retry_email_deliveries(
    State(state): State<AppState>,
    _auth: CronAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.config.email_retry_enabled {
        tracing::debug!("Email retry disabled, skipping pass");
        return Ok(Json(json!({ "disabled": true })));
    }

    let summary = state.retry_scheduler().run(Utc::now()).await?;
    let body = serde_json::to_value(summary).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(body))
}
