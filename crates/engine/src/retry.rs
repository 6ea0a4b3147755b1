//! Email delivery retry scheduler.
//!
//! Invoked periodically (cron endpoint or the worker binary). Each pass reads
//! a bounded batch of pending/failed deliveries below the attempt ceiling and
//! processes them one by one:
//!
//! 1. Skip rows still inside their backoff window
//! 2. Claim the row (rows claimed by a concurrent pass are skipped)
//! 3. Reload the order; a deleted order fails the delivery permanently
//! 4. Re-render and send; record `sent` or the failure

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use printshop_common::error::AppError;
use printshop_mailer::{EmailSender, ResendMailer};

use crate::claims::{DeliveryClaims, RedisClaims};
use crate::deliveries::DeliveryStore;
use crate::notify::{AttemptOutcome, Ineligible, Notifier, Schedule};
use crate::orders::OrderReader;

/// Default number of deliveries read per pass.
pub const DEFAULT_BATCH_SIZE: u32 = 20;

/// Counts for one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySummary {
    pub scanned: u32,
    pub skipped_backoff: u32,
    pub skipped_in_flight: u32,
    pub attempted: u32,
    pub sent: u32,
    pub failed: u32,
}

pub type PgRetryScheduler = RetryScheduler<PgPool, PgPool, ResendMailer, RedisClaims>;

pub struct RetryScheduler<S, O, M, C> {
    notifier: Notifier<S, O, M, C>,
    batch_size: u32,
}

impl<S, O, M, C> RetryScheduler<S, O, M, C>
where
    S: DeliveryStore,
    O: OrderReader,
    M: EmailSender,
    C: DeliveryClaims,
{
    pub fn new(notifier: Notifier<S, O, M, C>, batch_size: u32) -> Self {
        Self {
            notifier,
            batch_size: batch_size.max(1),
        }
    }

    pub fn notifier(&self) -> &Notifier<S, O, M, C> {
        &self.notifier
    }

    /// Run one pass over the retry queue as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RetrySummary, AppError> {
        let policy = *self.notifier.policy();
        let batch = self
            .notifier
            .store()
            .fetch_retryable(self.batch_size, policy.max_attempts_i32())
            .await?;

        let mut summary = RetrySummary {
            scanned: batch.len() as u32,
            ..Default::default()
        };

        for delivery in &batch {
            if policy.is_exhausted(delivery.attempts) {
                continue;
            }
            if !policy.is_due(delivery, now) {
                summary.skipped_backoff += 1;
                continue;
            }

            match self.notifier.attempt(delivery.id, now, Schedule::Backoff).await {
                Ok(AttemptOutcome::Sent { .. }) => {
                    summary.attempted += 1;
                    summary.sent += 1;
                }
                Ok(AttemptOutcome::Failed { .. }) => {
                    summary.attempted += 1;
                    summary.failed += 1;
                }
                Ok(AttemptOutcome::OrderMissing) => summary.failed += 1,
                Ok(AttemptOutcome::NotEligible(Ineligible::Backoff)) => {
                    summary.skipped_backoff += 1
                }
                // Settled under the claim: a concurrent invocation finished it.
                Ok(AttemptOutcome::InFlight)
                | Ok(AttemptOutcome::NotEligible(Ineligible::Settled)) => {
                    summary.skipped_in_flight += 1
                }
                // Without the claim store no row can be attempted safely.
                Err(AppError::Redis(e)) => {
                    tracing::error!(
                        delivery_id = %delivery.id,
                        error = %e,
                        scanned = summary.scanned,
                        attempted = summary.attempted,
                        "Claim store unreachable, aborting email retry pass"
                    );
                    return Err(AppError::Redis(e));
                }
                Err(e) => {
                    tracing::error!(
                        delivery_id = %delivery.id,
                        order_id = %delivery.order_id,
                        error = %e,
                        "Email delivery retry errored"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            skipped_backoff = summary.skipped_backoff,
            skipped_in_flight = summary.skipped_in_flight,
            attempted = summary.attempted,
            sent = summary.sent,
            failed = summary.failed,
            "Email retry pass finished"
        );

        Ok(summary)
    }
}
