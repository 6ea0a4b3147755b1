//! Order pipeline. Order status is a flat tag moved by admin actions.
//!
//! Any status may follow any other; the only behavior attached to a status
//! change is the customer email selected by [`EmailType::for_status`].

use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use printshop_common::error::AppError;
use printshop_common::types::{EmailType, LineItem, Order, OrderStatus};

/// Read access to an order and its line items.
pub trait OrderReader: Send + Sync {
    fn find_with_items(
        &self,
        order_id: Uuid,
    ) -> impl Future<Output = Result<Option<(Order, Vec<LineItem>)>, AppError>> + Send;
}

/// Result of an admin status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub order: Order,
    pub previous: OrderStatus,
    /// Email the customer should receive for the new status
    pub email: Option<EmailType>,
}

/// Service layer for orders.
pub struct OrderService;

impl OrderService {
    pub async fn get(pool: &PgPool, order_id: Uuid) -> Result<Order, AppError> {
        let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        Ok(order)
    }

    /// Load an order with its line items in creation order.
    pub async fn find_with_items(
        pool: &PgPool,
        order_id: Uuid,
    ) -> Result<Option<(Order, Vec<LineItem>)>, AppError> {
        let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(pool)
            .await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items: Vec<LineItem> = sqlx::query_as(
            "SELECT * FROM line_items WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;

        Ok(Some((order, items)))
    }

    /// Set an order's status, optionally recording a tracking number.
    pub async fn set_status(
        pool: &PgPool,
        order_id: Uuid,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<StatusChange, AppError> {
        let previous = Self::get(pool, order_id).await?.status;

        let order: Order = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = $1, tracking_number = COALESCE($2, tracking_number), updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(status.to_string())
        .bind(tracking_number)
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        tracing::info!(
            order_id = %order_id,
            from = %previous,
            to = %status,
            "Order status updated"
        );

        Ok(StatusChange {
            email: Self::email_for_change(previous, status),
            order,
            previous,
        })
    }

    /// Email to send when an order moves from `previous` to `next`.
    ///
    /// Re-applying the current status does not send the email again.
    pub fn email_for_change(previous: OrderStatus, next: OrderStatus) -> Option<EmailType> {
        if previous == next {
            return None;
        }
        EmailType::for_status(next)
    }
}

impl OrderReader for PgPool {
    async fn find_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(Order, Vec<LineItem>)>, AppError> {
        OrderService::find_with_items(self, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_for_change() {
        assert_eq!(
            OrderService::email_for_change(OrderStatus::Pending, OrderStatus::Paid),
            Some(EmailType::OrderConfirmation)
        );
        assert_eq!(
            OrderService::email_for_change(OrderStatus::Printed, OrderStatus::Shipped),
            Some(EmailType::ShippingNotification)
        );
        assert_eq!(
            OrderService::email_for_change(OrderStatus::Paid, OrderStatus::Paid),
            None
        );
        assert_eq!(
            OrderService::email_for_change(OrderStatus::Paid, OrderStatus::InProduction),
            None
        );
    }

    #[test]
    fn test_any_transition_is_allowed() {
        // Cancelled orders can be reopened; there are no transition guards.
        assert_eq!(
            OrderService::email_for_change(OrderStatus::Cancelled, OrderStatus::Paid),
            Some(EmailType::OrderConfirmation)
        );
    }
}
