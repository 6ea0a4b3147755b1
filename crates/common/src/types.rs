use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
///
/// A flat tag on the order row: admin actions may move an order to any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    InProduction,
    Printed,
    Shipped,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::InProduction => write!(f, "in_production"),
            OrderStatus::Printed => write!(f, "printed"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Kind of transactional email sent for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EmailType {
    OrderConfirmation,
    ShippingNotification,
}

impl EmailType {
    /// The email a customer should receive when their order enters `status`, if any.
    pub fn for_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Paid => Some(EmailType::OrderConfirmation),
            OrderStatus::Shipped => Some(EmailType::ShippingNotification),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailType::OrderConfirmation => write!(f, "order_confirmation"),
            EmailType::ShippingNotification => write!(f, "shipping_notification"),
        }
    }
}

/// Email delivery status. `Sent` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!(
                "Invalid delivery status '{}'. Valid statuses: pending, sent, failed",
                other
            )),
        }
    }
}

/// Review state of a line item's uploaded artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtworkStatus {
    PendingReview,
    Approved,
    Flagged,
    Rejected,
}

impl std::fmt::Display for ArtworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtworkStatus::PendingReview => write!(f, "pending_review"),
            ArtworkStatus::Approved => write!(f, "approved"),
            ArtworkStatus::Flagged => write!(f, "flagged"),
            ArtworkStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Customer-facing order number (e.g., "PS-10042")
    pub order_number: String,
    pub customer_email: String,
    pub customer_name: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// ISO 4217 code, e.g. "USD"
    pub currency: String,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single product line on an order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_name: String,
    /// Size / finish / material selection, if the product has variants
    pub variant: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub artwork_url: Option<String>,
    /// Free-form review notes; carries the artwork review tag
    pub artwork_notes: String,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    pub fn line_total_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }
}

/// One record of sending a specific notification email for a specific order.
///
/// `attempts` never decreases and `Sent` is terminal. Rows are never deleted,
/// and `order_id` may point at an order that no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailDelivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub email_type: EmailType,
    pub to_email: String,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
