//! Admin email delivery routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{DeliveryStatus, EmailDelivery};
use printshop_engine::backoff::RetryPolicy;
use printshop_engine::deliveries::DeliveryService;

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

/// Default page size for the delivery listing.
const DEFAULT_LIST_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/email-deliveries", get(list_deliveries))
        .route("/api/admin/email-deliveries/{id}/resend", post(resend_delivery))
}

#[derive(Debug, Deserialize)]
pub struct ListDeliveriesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// A delivery plus when the scheduler will next try it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryView {
    #[serde(flatten)]
    pub delivery: EmailDelivery,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl DeliveryView {
    fn new(delivery: EmailDelivery, policy: &RetryPolicy) -> Self {
        let next_attempt_at = match delivery.status {
            DeliveryStatus::Sent => None,
            _ => policy.next_attempt_at(&delivery),
        };
        Self {
            delivery,
            next_attempt_at,
        }
    }
}

/// GET /api/admin/email-deliveries: List deliveries, newest first.
async fn list_deliveries(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<Vec<DeliveryView>>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<DeliveryStatus>)
        .transpose()
        .map_err(AppError::Validation)?;

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=DeliveryService::MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            DeliveryService::MAX_LIST_LIMIT
        )));
    }

    let policy = RetryPolicy::from_config(&state.config);
    let deliveries = DeliveryService::list(&state.pool, status, limit).await?;

    Ok(Json(
        deliveries
            .into_iter()
            .map(|d| DeliveryView::new(d, &policy))
            .collect(),
    ))
}

/// POST /api/admin/email-deliveries/:id/resend: Attempt a delivery right away.
async fn resend_delivery(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryView>, AppError> {
    let notifier = state.notifier();
    let delivery = notifier.resend(id, Utc::now()).await?;

    tracing::info!(
        delivery_id = %id,
        admin = %admin.email,
        status = %delivery.status,
        "Admin resent email delivery"
    );

    Ok(Json(DeliveryView::new(delivery, notifier.policy())))
}
