//! In-memory collaborators for scheduler and notifier tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{
    DeliveryStatus, EmailDelivery, EmailType, LineItem, Order, OrderStatus,
};
use printshop_mailer::{EmailMessage, EmailRenderer, EmailSender, MailerError};

use crate::backoff::RetryPolicy;
use crate::claims::DeliveryClaims;
use crate::deliveries::DeliveryStore;
use crate::notify::Notifier;
use crate::orders::OrderReader;

pub type TestNotifier = Notifier<FakeStore, FakeOrders, FakeMailer, FakeClaims>;

pub fn make_delivery(order_id: Uuid) -> EmailDelivery {
    EmailDelivery {
        id: Uuid::new_v4(),
        order_id,
        email_type: EmailType::OrderConfirmation,
        to_email: "customer@example.com".to_string(),
        status: DeliveryStatus::Pending,
        attempts: 0,
        last_error: None,
        last_attempt_at: None,
        sent_at: None,
        created_at: Utc::now(),
    }
}

pub fn make_order() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        order_number: "PS-1001".to_string(),
        customer_email: "customer@example.com".to_string(),
        customer_name: "Alex".to_string(),
        status: OrderStatus::Paid,
        subtotal_cents: 1200,
        shipping_cents: 300,
        tax_cents: 96,
        total_cents: 1596,
        currency: "USD".to_string(),
        tracking_number: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn make_item(order_id: Uuid) -> LineItem {
    LineItem {
        id: Uuid::new_v4(),
        order_id,
        product_name: "Die-cut sticker".to_string(),
        variant: Some("2in glossy".to_string()),
        quantity: 10,
        unit_price_cents: 120,
        artwork_url: None,
        artwork_notes: String::new(),
        created_at: Utc::now(),
    }
}

pub fn test_notifier(store: FakeStore, orders: FakeOrders, mailer: FakeMailer) -> TestNotifier {
    Notifier::new(
        store,
        orders,
        mailer,
        FakeClaims::default(),
        EmailRenderer::new("Printshop", "https://shop.example.com", "orders@example.com"),
        RetryPolicy::default(),
    )
}

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<HashMap<Uuid, EmailDelivery>>,
    writes: AtomicUsize,
    /// Returned once by `fetch_retryable` in place of the stored rows
    stale_batch: Mutex<Option<Vec<EmailDelivery>>>,
    mark_sent_failures: AtomicU32,
}

impl FakeStore {
    pub fn with(rows: impl IntoIterator<Item = EmailDelivery>) -> Self {
        let store = Self::default();
        {
            let mut map = store.rows.lock().unwrap();
            for row in rows {
                map.insert(row.id, row);
            }
        }
        store
    }

    pub fn row(&self, id: Uuid) -> EmailDelivery {
        self.rows.lock().unwrap()[&id].clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Replace a stored row, as another invocation would.
    pub fn put(&self, row: EmailDelivery) {
        self.rows.lock().unwrap().insert(row.id, row);
    }

    /// Make the next `fetch_retryable` return `rows` as read before a concurrent update.
    pub fn serve_stale_batch(&self, rows: Vec<EmailDelivery>) {
        *self.stale_batch.lock().unwrap() = Some(rows);
    }

    /// Fail the next `n` calls to `mark_sent` with a database error.
    pub fn fail_mark_sent(&self, n: u32) {
        self.mark_sent_failures.store(n, Ordering::SeqCst);
    }

    fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut EmailDelivery),
    ) -> Option<EmailDelivery> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id)?;
        if row.status == DeliveryStatus::Sent {
            return None;
        }
        apply(row);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Some(row.clone())
    }
}

impl DeliveryStore for FakeStore {
    async fn create(
        &self,
        order_id: Uuid,
        email_type: EmailType,
        to_email: &str,
    ) -> Result<EmailDelivery, AppError> {
        let mut delivery = make_delivery(order_id);
        delivery.email_type = email_type;
        delivery.to_email = to_email.to_string();
        self.rows.lock().unwrap().insert(delivery.id, delivery.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(delivery)
    }

    async fn get(&self, id: Uuid) -> Result<Option<EmailDelivery>, AppError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_retryable(
        &self,
        limit: u32,
        max_attempts: i32,
    ) -> Result<Vec<EmailDelivery>, AppError> {
        if let Some(stale) = self.stale_batch.lock().unwrap().take() {
            return Ok(stale);
        }
        let mut rows: Vec<EmailDelivery> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.status != DeliveryStatus::Sent && d.attempts < max_attempts)
            .cloned()
            .collect();
        rows.sort_by_key(|d| (d.last_attempt_at.is_some(), d.last_attempt_at, d.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        let failures = self.mark_sent_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.mark_sent_failures.store(failures - 1, Ordering::SeqCst);
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.update(id, |d| {
            d.status = DeliveryStatus::Sent;
            d.sent_at = Some(now);
            d.last_attempt_at = Some(now);
            d.attempts += 1;
            d.last_error = None;
        }))
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EmailDelivery>, AppError> {
        Ok(self.update(id, |d| {
            d.status = DeliveryStatus::Failed;
            d.attempts += 1;
            d.last_error = Some(error.to_string());
            d.last_attempt_at = Some(now);
        }))
    }

    async fn abandon(
        &self,
        id: Uuid,
        error: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Option<EmailDelivery>, AppError> {
        Ok(self.update(id, |d| {
            d.status = DeliveryStatus::Failed;
            d.attempts = d.attempts.max(max_attempts);
            d.last_error = Some(error.to_string());
            d.last_attempt_at = Some(now);
        }))
    }
}

#[derive(Default)]
pub struct FakeOrders {
    orders: Mutex<HashMap<Uuid, (Order, Vec<LineItem>)>>,
}

impl FakeOrders {
    pub fn with(order: Order, items: Vec<LineItem>) -> Self {
        let orders = Self::default();
        orders.orders.lock().unwrap().insert(order.id, (order, items));
        orders
    }

    pub fn remove(&self, order_id: Uuid) {
        self.orders.lock().unwrap().remove(&order_id);
    }
}

impl OrderReader for FakeOrders {
    async fn find_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(Order, Vec<LineItem>)>, AppError> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }
}

/// Records every message; fails the first `failures` sends.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failures: AtomicU32,
}

impl FakeMailer {
    pub fn failing(failures: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicU32::new(failures),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl EmailSender for FakeMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String, MailerError> {
        self.sent.lock().unwrap().push(message.clone());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(MailerError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(format!("msg_{}", Uuid::new_v4()))
    }
}

/// Claims held in memory; `hold` simulates another invocation.
#[derive(Default)]
pub struct FakeClaims {
    held: Mutex<HashSet<Uuid>>,
    unreachable: AtomicBool,
    pub released: AtomicUsize,
}

impl FakeClaims {
    pub fn hold(&self, id: Uuid) {
        self.held.lock().unwrap().insert(id);
    }

    pub fn is_held(&self, id: Uuid) -> bool {
        self.held.lock().unwrap().contains(&id)
    }

    /// Fail every claim as if Redis were down.
    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }
}

impl DeliveryClaims for FakeClaims {
    async fn try_claim(&self, delivery_id: Uuid) -> Result<bool, AppError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        Ok(self.held.lock().unwrap().insert(delivery_id))
    }

    async fn release(&self, delivery_id: Uuid) -> Result<(), AppError> {
        self.held.lock().unwrap().remove(&delivery_id);
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
