//! In-flight claims for email deliveries.
//!
//! Overlapping cron invocations (or a cron pass racing the first send) must not
//! both send the same delivery. Before an attempt, the caller claims the row in
//! Redis with `SET NX EX`; whoever loses the race skips the row. The TTL frees
//! claims held by an invocation that died mid-send.

use std::future::Future;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use printshop_common::error::AppError;

/// Default claim lifetime in seconds (5 minutes).
const DEFAULT_CLAIM_TTL_SECONDS: u64 = 300;

/// Mutual exclusion for delivery attempts.
pub trait DeliveryClaims: Send + Sync {
    /// Returns `true` if the claim was acquired.
    fn try_claim(&self, delivery_id: Uuid) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn release(&self, delivery_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Redis-backed claims.
#[derive(Clone)]
pub struct RedisClaims {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisClaims {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            ttl_seconds: DEFAULT_CLAIM_TTL_SECONDS,
        }
    }

    fn key(delivery_id: Uuid) -> String {
        format!("email_delivery:claim:{}", delivery_id)
    }
}

impl DeliveryClaims for RedisClaims {
    async fn try_claim(&self, delivery_id: Uuid) -> Result<bool, AppError> {
        let mut redis = self.redis.clone();

        // SET key "1" NX EX ttl
        // Some("OK") → claimed; None → someone else holds it
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::key(delivery_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut redis)
            .await?;

        let claimed = result.is_some();
        if !claimed {
            tracing::debug!(delivery_id = %delivery_id, "Delivery already claimed by another invocation");
        }

        Ok(claimed)
    }

    async fn release(&self, delivery_id: Uuid) -> Result<(), AppError> {
        let mut redis = self.redis.clone();
        redis.del::<_, ()>(Self::key(delivery_id)).await?;
        Ok(())
    }
}
