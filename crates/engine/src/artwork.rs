//! Artwork review workflow.
//!
//! The review state of a line item's artwork is a tag embedded in its
//! `artwork_notes` text: `[APPROVED]`, `[FLAGGED]` or `[REJECTED]`. Notes
//! without a recognized tag are pending review.

use sqlx::PgPool;
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{ArtworkStatus, LineItem};

/// Tag string for a status; `PendingReview` has none.
fn tag_for(status: ArtworkStatus) -> Option<&'static str> {
    match status {
        ArtworkStatus::PendingReview => None,
        ArtworkStatus::Approved => Some("APPROVED"),
        ArtworkStatus::Flagged => Some("FLAGGED"),
        ArtworkStatus::Rejected => Some("REJECTED"),
    }
}

fn status_for_tag(tag: &str) -> Option<ArtworkStatus> {
    match tag.trim().to_ascii_uppercase().as_str() {
        "APPROVED" => Some(ArtworkStatus::Approved),
        "FLAGGED" => Some(ArtworkStatus::Flagged),
        "REJECTED" => Some(ArtworkStatus::Rejected),
        _ => None,
    }
}

/// Byte range of the first recognized tag at or after `from`.
/// `end` is one past the closing bracket.
fn next_tag(notes: &str, from: usize) -> Option<(usize, usize, ArtworkStatus)> {
    let mut cursor = from;
    while let Some(offset) = notes[cursor..].find('[') {
        let start = cursor + offset;
        let len = notes[start + 1..].find(']')?;
        let end = start + 1 + len + 1;
        if let Some(status) = status_for_tag(&notes[start + 1..end - 1]) {
            return Some((start, end, status));
        }
        cursor = start + 1;
    }
    None
}

/// Current review status encoded in `notes`. The first recognized tag wins.
pub fn status_from_notes(notes: &str) -> ArtworkStatus {
    next_tag(notes, 0)
        .map(|(_, _, status)| status)
        .unwrap_or(ArtworkStatus::PendingReview)
}

/// Remove every recognized tag from `notes`, keeping the free text.
pub fn strip_tags(notes: &str) -> String {
    let mut out = String::with_capacity(notes.len());
    let mut cursor = 0;
    while let Some((start, end, _)) = next_tag(notes, cursor) {
        out.push_str(&notes[cursor..start]);
        cursor = end;
        if notes[cursor..].starts_with(' ') {
            cursor += 1;
        }
    }
    out.push_str(&notes[cursor..]);
    out.trim().to_string()
}

/// Replace the review tag in `notes` with the one for `status`.
pub fn apply_status(notes: &str, status: ArtworkStatus) -> String {
    let text = strip_tags(notes);
    match (tag_for(status), text.is_empty()) {
        (Some(tag), true) => format!("[{}]", tag),
        (Some(tag), false) => format!("[{}] {}", tag, text),
        (None, _) => text,
    }
}

/// Service layer for artwork review actions.
pub struct ArtworkService;

impl ArtworkService {
    /// Set the review status of a line item's artwork, optionally appending a reviewer note.
    pub async fn review(
        pool: &PgPool,
        line_item_id: Uuid,
        status: ArtworkStatus,
        note: Option<&str>,
    ) -> Result<LineItem, AppError> {
        let existing: LineItem = sqlx::query_as("SELECT * FROM line_items WHERE id = $1")
            .bind(line_item_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Line item {} not found", line_item_id)))?;

        let notes = Self::updated_notes(&existing.artwork_notes, status, note);

        let item: LineItem = sqlx::query_as(
            "UPDATE line_items SET artwork_notes = $1 WHERE id = $2 RETURNING *",
        )
        .bind(&notes)
        .bind(line_item_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            line_item_id = %line_item_id,
            order_id = %item.order_id,
            status = %status,
            "Artwork reviewed"
        );

        Ok(item)
    }

    fn updated_notes(current: &str, status: ArtworkStatus, note: Option<&str>) -> String {
        let notes = apply_status(current, status);
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) if notes.is_empty() => note.to_string(),
            Some(note) => format!("{}\n{}", notes, note),
            None => notes,
        }
    }
}
