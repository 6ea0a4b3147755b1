//! Admin artwork review routes.

use axum::extract::{Path, State};
use axum::routing::patch;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{ArtworkStatus, LineItem};
use printshop_engine::artwork::{ArtworkService, status_from_notes};

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/admin/line-items/{id}/artwork", patch(review_artwork))
}

#[derive(Debug, Deserialize)]
pub struct ReviewArtworkRequest {
    pub status: ArtworkStatus,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewArtworkResponse {
    pub line_item: LineItem,
    pub artwork_status: ArtworkStatus,
}

/// PATCH /api/admin/line-items/:id/artwork: Set the artwork review status.
async fn review_artwork(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewArtworkRequest>,
) -> Result<Json<ReviewArtworkResponse>, AppError> {
    let line_item = ArtworkService::review(&state.pool, id, req.status, req.note.as_deref()).await?;

    tracing::info!(line_item_id = %id, admin = %admin.email, status = %req.status, "Artwork review saved");

    Ok(Json(ReviewArtworkResponse {
        artwork_status: status_from_notes(&line_item.artwork_notes),
        line_item,
    }))
}
