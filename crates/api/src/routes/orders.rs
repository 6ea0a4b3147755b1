//! Admin order routes.

use axum::extract::{Path, State};
use axum::routing::patch;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{EmailDelivery, Order, OrderStatus};
use printshop_engine::orders::OrderService;

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/orders/{id}/status", patch(update_status))
}

/// Request body for a status change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub order: Order,
    /// Customer email triggered by the change, if any
    pub email_delivery: Option<EmailDelivery>,
}

/// PATCH /api/admin/orders/:id/status: Move an order to a new status.
///
/// Entering `paid` or `shipped` sends the matching customer email; a failed
/// send is left for the retry scheduler and does not fail the request.
async fn update_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, AppError> {
    let tracking = req
        .tracking_number
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let change = OrderService::set_status(&state.pool, id, req.status, tracking).await?;

    tracing::info!(
        order_id = %id,
        admin = %admin.email,
        status = %req.status,
        "Admin changed order status"
    );

    let email_delivery = match change.email {
        Some(email_type) => {
            match state
                .notifier()
                .send_order_email(&change.order, email_type, Utc::now())
                .await
            {
                Ok(delivery) => Some(delivery),
                Err(e) => {
                    tracing::error!(
                        order_id = %id,
                        email_type = %email_type,
                        error = %e,
                        "Could not queue order email"
                    );
                    None
                }
            }
        }
        None => None,
    };

    Ok(Json(UpdateStatusResponse {
        order: change.order,
        email_delivery,
    }))
}
