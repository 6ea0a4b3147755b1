//! Sending order emails and recording each attempt.
//!
//! [`Notifier`] owns the single code path that sends a delivery: claim the
//! row, re-check it, reload the order, render, send, record the outcome,
//! release the claim. The first send after an order event, the admin
//! resend, and the retry scheduler all go through [`Notifier::attempt`].

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use uuid::Uuid;

use printshop_common::config::AppConfig;
use printshop_common::error::AppError;
use printshop_common::types::{DeliveryStatus, EmailDelivery, EmailType, Order};
use printshop_mailer::{EmailRenderer, EmailSender, ResendMailer};

use crate::backoff::RetryPolicy;
use crate::claims::{DeliveryClaims, RedisClaims};
use crate::deliveries::DeliveryStore;
use crate::orders::OrderReader;

/// Whether an attempt must respect the backoff window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Only attempt once the backoff delay has elapsed
    Backoff,
    /// Attempt now (first send, admin resend)
    Immediate,
}

/// Why a claimed delivery was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// Still inside its backoff window
    Backoff,
    /// Sent, exhausted, or gone by the time the claim was taken
    Settled,
}

/// What happened to a delivery during one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The provider accepted the email. `recorded` is false when the row
    /// could not be marked sent; the claim is then kept until its TTL expires.
    Sent { recorded: bool },
    Failed { exhausted: bool },
    /// The order was deleted; the delivery is now terminal-failed
    OrderMissing,
    /// Another invocation holds the claim
    InFlight,
    NotEligible(Ineligible),
}

/// Sends order emails through a store, an order reader, a mailer and a claim lock.
pub struct Notifier<S, O, M, C> {
    store: S,
    orders: O,
    mailer: M,
    claims: C,
    renderer: EmailRenderer,
    policy: RetryPolicy,
}

/// The production notifier: PostgreSQL store and orders, Resend, Redis claims.
pub type PgNotifier = Notifier<PgPool, PgPool, ResendMailer, RedisClaims>;

impl PgNotifier {
    pub fn from_config(
        pool: PgPool,
        redis: ConnectionManager,
        mailer: ResendMailer,
        config: &AppConfig,
    ) -> Self {
        Notifier::new(
            pool.clone(),
            pool,
            mailer,
            RedisClaims::new(redis),
            EmailRenderer::new(&config.store_name, &config.store_url, &config.email_from),
            RetryPolicy::from_config(config),
        )
    }
}

impl<S, O, M, C> Notifier<S, O, M, C>
where
    S: DeliveryStore,
    O: OrderReader,
    M: EmailSender,
    C: DeliveryClaims,
{
    pub fn new(
        store: S,
        orders: O,
        mailer: M,
        claims: C,
        renderer: EmailRenderer,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            orders,
            mailer,
            claims,
            renderer,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn claims(&self) -> &C {
        &self.claims
    }

    /// Queue an email for `order` and make the first attempt right away.
    ///
    /// A failed send is recorded on the delivery (for the retry scheduler)
    /// rather than returned as an error.
    pub async fn send_order_email(
        &self,
        order: &Order,
        email_type: EmailType,
        now: DateTime<Utc>,
    ) -> Result<EmailDelivery, AppError> {
        let delivery = self
            .store
            .create(order.id, email_type, &order.customer_email)
            .await?;

        let outcome = self.attempt(delivery.id, now, Schedule::Immediate).await?;
        tracing::debug!(delivery_id = %delivery.id, ?outcome, "First delivery attempt finished");

        self.reload(delivery.id).await
    }

    /// Make one immediate attempt for an existing delivery (admin resend).
    ///
    /// The attempt ceiling still applies and sent deliveries are never resent.
    pub async fn resend(&self, delivery_id: Uuid, now: DateTime<Utc>) -> Result<EmailDelivery, AppError> {
        let delivery = self.reload(delivery_id).await?;

        if delivery.status == DeliveryStatus::Sent {
            return Err(AppError::Validation(format!(
                "Email delivery {} was already sent",
                delivery_id
            )));
        }
        if self.policy.is_exhausted(delivery.attempts) {
            return Err(AppError::Validation(format!(
                "Email delivery {} reached the maximum of {} attempts",
                delivery_id, self.policy.max_attempts
            )));
        }

        match self.attempt(delivery_id, now, Schedule::Immediate).await? {
            AttemptOutcome::InFlight => Err(AppError::Validation(format!(
                "Email delivery {} is being sent by another process",
                delivery_id
            ))),
            _ => self.reload(delivery_id).await,
        }
    }

    /// Claim and attempt a delivery, releasing the claim afterwards.
    pub async fn attempt(
        &self,
        delivery_id: Uuid,
        now: DateTime<Utc>,
        schedule: Schedule,
    ) -> Result<AttemptOutcome, AppError> {
        if !self.claims.try_claim(delivery_id).await? {
            return Ok(AttemptOutcome::InFlight);
        }

        let result = self.attempt_claimed(delivery_id, now, schedule).await;

        if matches!(result, Ok(AttemptOutcome::Sent { recorded: false })) {
            return result;
        }

        if let Err(e) = self.claims.release(delivery_id).await {
            tracing::warn!(delivery_id = %delivery_id, error = %e, "Failed to release delivery claim");
        }

        result
    }

    async fn attempt_claimed(
        &self,
        delivery_id: Uuid,
        now: DateTime<Utc>,
        schedule: Schedule,
    ) -> Result<AttemptOutcome, AppError> {
        // Re-read under the claim: another invocation may have finished it.
        let Some(delivery) = self.store.get(delivery_id).await? else {
            return Ok(AttemptOutcome::NotEligible(Ineligible::Settled));
        };
        if delivery.status == DeliveryStatus::Sent || self.policy.is_exhausted(delivery.attempts) {
            return Ok(AttemptOutcome::NotEligible(Ineligible::Settled));
        }
        if schedule == Schedule::Backoff && !self.policy.is_due(&delivery, now) {
            return Ok(AttemptOutcome::NotEligible(Ineligible::Backoff));
        }

        let Some((order, items)) = self.orders.find_with_items(delivery.order_id).await? else {
            let error = format!("Order {} no longer exists", delivery.order_id);
            self.store
                .abandon(delivery.id, &error, now, self.policy.max_attempts_i32())
                .await?;
            tracing::warn!(
                delivery_id = %delivery.id,
                order_id = %delivery.order_id,
                "Order missing, email delivery abandoned"
            );
            return Ok(AttemptOutcome::OrderMissing);
        };

        let message = self
            .renderer
            .render(delivery.email_type, &order, &items, &delivery.to_email);

        match self.mailer.send(&message).await {
            Ok(provider_id) => {
                if let Err(e) = self.store.mark_sent(delivery.id, now).await {
                    tracing::error!(
                        delivery_id = %delivery.id,
                        order_id = %order.id,
                        provider_id = %provider_id,
                        error = %e,
                        "Email sent but delivery could not be marked sent; keeping claim"
                    );
                    return Ok(AttemptOutcome::Sent { recorded: false });
                }
                tracing::info!(
                    delivery_id = %delivery.id,
                    order_id = %order.id,
                    email_type = %delivery.email_type,
                    provider_id = %provider_id,
                    "Email sent"
                );
                Ok(AttemptOutcome::Sent { recorded: true })
            }
            Err(e) => {
                let error = e.to_string();
                let attempts = self
                    .store
                    .record_failure(delivery.id, &error, now)
                    .await?
                    .map_or(delivery.attempts + 1, |d| d.attempts);
                let exhausted = self.policy.is_exhausted(attempts);

                if exhausted {
                    tracing::error!(
                        delivery_id = %delivery.id,
                        order_id = %order.id,
                        attempts,
                        error = %error,
                        "Email delivery failed permanently"
                    );
                } else {
                    tracing::warn!(
                        delivery_id = %delivery.id,
                        order_id = %order.id,
                        attempts,
                        error = %error,
                        "Email delivery failed, will retry"
                    );
                }

                Ok(AttemptOutcome::Failed { exhausted })
            }
        }
    }

    async fn reload(&self, delivery_id: Uuid) -> Result<EmailDelivery, AppError> {
        self.store
            .get(delivery_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Email delivery {} not found", delivery_id)))
    }
}
