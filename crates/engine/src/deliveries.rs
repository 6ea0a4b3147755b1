//! Email delivery queue backed by the `email_deliveries` table.
//!
//! Every write is guarded by `status <> 'sent'` so a sent delivery is never
//! touched again, and `attempts` only ever grows.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{DeliveryStatus, EmailDelivery, EmailType};

/// Storage operations needed to send and retry deliveries.
pub trait DeliveryStore: Send + Sync {
    fn create(
        &self,
        order_id: Uuid,
        email_type: EmailType,
        to_email: &str,
    ) -> impl Future<Output = Result<EmailDelivery, AppError>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<EmailDelivery>, AppError>> + Send;

    /// Pending or failed deliveries below the attempt ceiling, least recently attempted first.
    fn fetch_retryable(
        &self,
        limit: u32,
        max_attempts: i32,
    ) -> impl Future<Output = Result<Vec<EmailDelivery>, AppError>> + Send;

    /// Returns `None` if the delivery is missing or already sent.
    fn mark_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<EmailDelivery>, AppError>> + Send;

    /// Returns `None` if the delivery is missing or already sent.
    fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<EmailDelivery>, AppError>> + Send;

    /// Fail permanently by raising `attempts` to the ceiling.
    fn abandon(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> impl Future<Output = Result<Option<EmailDelivery>, AppError>> + Send;
}

/// Service layer over the `email_deliveries` table.
pub struct DeliveryService;

impl DeliveryService {
    /// Maximum page size for listings.
    pub const MAX_LIST_LIMIT: i64 = 200;

    pub async fn create(
        pool: &PgPool,
        order_id: Uuid,
        email_type: EmailType,
        to_email: &str,
    ) -> Result<EmailDelivery, AppError> {
        let delivery: EmailDelivery = sqlx::query_as(
            r#"
            INSERT INTO email_deliveries (id, order_id, email_type, to_email, status, attempts)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(email_type.to_string())
        .bind(to_email)
        .bind(DeliveryStatus::Pending.to_string())
        .fetch_one(pool)
        .await?;

        tracing::info!(
            delivery_id = %delivery.id,
            order_id = %order_id,
            email_type = %email_type,
            "Email delivery queued"
        );

        Ok(delivery)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<EmailDelivery>, AppError> {
        let delivery = sqlx::query_as("SELECT * FROM email_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(delivery)
    }

    pub async fn fetch_retryable(
        pool: &PgPool,
        limit: u32,
        max_attempts: i32,
    ) -> Result<Vec<EmailDelivery>, AppError> {
        let deliveries: Vec<EmailDelivery> = sqlx::query_as(
            r#"
            SELECT * FROM email_deliveries
            WHERE status IN ($1, $2)
              AND attempts < $3
            ORDER BY last_attempt_at ASC NULLS FIRST, created_at ASC
            LIMIT $4
            "#,
        )
        .bind(DeliveryStatus::Pending.to_string())
        .bind(DeliveryStatus::Failed.to_string())
        .bind(max_attempts)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

        Ok(deliveries)
    }

    pub async fn mark_sent(
        pool: &PgPool,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        let delivery = sqlx::query_as(
            r#"
            UPDATE email_deliveries
            SET status = $1, sent_at = $2, last_attempt_at = $2,
                attempts = attempts + 1, last_error = NULL
            WHERE id = $3 AND status <> $1
            RETURNING *
            "#,
        )
        .bind(DeliveryStatus::Sent.to_string())
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(delivery)
    }

    pub async fn record_failure(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        let delivery = sqlx::query_as(
            r#"
            UPDATE email_deliveries
            SET status = $1, attempts = attempts + 1, last_error = $2, last_attempt_at = $3
            WHERE id = $4 AND status <> $5
            RETURNING *
            "#,
        )
        .bind(DeliveryStatus::Failed.to_string())
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(DeliveryStatus::Sent.to_string())
        .fetch_optional(pool)
        .await?;

        Ok(delivery)
    }

    pub async fn abandon(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Option<EmailDelivery>, AppError> {
        let delivery = sqlx::query_as(
            r#"
            UPDATE email_deliveries
            SET status = $1, attempts = GREATEST(attempts, $2), last_error = $3, last_attempt_at = $4
            WHERE id = $5 AND status <> $6
            RETURNING *
            "#,
        )
        .bind(DeliveryStatus::Failed.to_string())
        .bind(max_attempts)
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(DeliveryStatus::Sent.to_string())
        .fetch_optional(pool)
        .await?;

        Ok(delivery)
    }

    /// List deliveries, newest first, optionally filtered by status.
    pub async fn list(
        pool: &PgPool,
        status: Option<DeliveryStatus>,
        limit: i64,
    ) -> Result<Vec<EmailDelivery>, AppError> {
        let limit = limit.clamp(1, Self::MAX_LIST_LIMIT);
        let deliveries: Vec<EmailDelivery> = sqlx::query_as(
            r#"
            SELECT * FROM email_deliveries
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(deliveries)
    }
}

impl DeliveryStore for PgPool {
    async fn create(
        &self,
        order_id: Uuid,
        email_type: EmailType,
        to_email: &str,
    ) -> Result<EmailDelivery, AppError> {
        DeliveryService::create(self, order_id, email_type, to_email).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<EmailDelivery>, AppError> {
        DeliveryService::get(self, id).await
    }

    async fn fetch_retryable(
        &self,
        limit: u32,
        max_attempts: i32,
    ) -> Result<Vec<EmailDelivery>, AppError> {
        DeliveryService::fetch_retryable(self, limit, max_attempts).await
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        DeliveryService::mark_sent(self, id, now).await
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        DeliveryService::record_failure(self, id, error, now).await
    }

    async fn abandon(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Option<EmailDelivery>, AppError> {
        DeliveryService::abandon(self, id, error, now, max_attempts).await
    }
}
