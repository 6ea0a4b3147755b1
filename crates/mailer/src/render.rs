//! Email content rendering.
//!
//! Rendering is a pure function of the order and its line items, so a retry
//! reproduces the content of the original send.

use std::fmt::Write;

use printshop_common::types::{EmailType, LineItem, Order};

use crate::EmailMessage;

/// Renders order emails with store branding.
#[derive(Debug, Clone)]
pub struct EmailRenderer {
    pub store_name: String,
    pub store_url: String,
    pub from: String,
}

impl EmailRenderer {
    pub fn new(
        store_name: impl Into<String>,
        store_url: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            store_url: store_url.into().trim_end_matches('/').to_string(),
            from: from.into(),
        }
    }

    /// Render the email of `email_type` for `order`, addressed to `to`.
    pub fn render(
        &self,
        email_type: EmailType,
        order: &Order,
        items: &[LineItem],
        to: &str,
    ) -> EmailMessage {
        let (subject, html, text) = match email_type {
            EmailType::OrderConfirmation => self.order_confirmation(order, items),
            EmailType::ShippingNotification => self.shipping_notification(order, items),
        };

        EmailMessage {
            from: format!("{} <{}>", self.store_name, self.from),
            to: to.to_string(),
            subject,
            html,
            text,
        }
    }

    fn order_link(&self, order: &Order) -> String {
        format!("{}/orders/{}", self.store_url, order.order_number)
    }

    fn order_confirmation(&self, order: &Order, items: &[LineItem]) -> (String, String, String) {
        let subject = format!(
            "{}: order {} confirmed",
            self.store_name, order.order_number
        );
        let link = self.order_link(order);

        let mut html = String::new();
        let _ = write!(
            html,
            "<h1>Thanks for your order, {}!</h1><p>We received order <strong>{}</strong> and will start printing soon.</p>",
            escape_html(&order.customer_name),
            escape_html(&order.order_number)
        );
        html.push_str("<table><thead><tr><th>Item</th><th>Qty</th><th>Total</th></tr></thead><tbody>");
        for item in items {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&item_label(item)),
                item.quantity,
                format_money(item.line_total_cents(), &order.currency)
            );
        }
        html.push_str("</tbody></table>");
        let _ = write!(
            html,
            "<p>Subtotal: {}<br>Shipping: {}<br>Tax: {}<br><strong>Total: {}</strong></p>",
            format_money(order.subtotal_cents, &order.currency),
            format_money(order.shipping_cents, &order.currency),
            format_money(order.tax_cents, &order.currency),
            format_money(order.total_cents, &order.currency)
        );
        let _ = write!(
            html,
            "<p><a href=\"{}\">View your order</a></p>",
            escape_html(&link)
        );

        let mut text = format!(
            "Thanks for your order, {}!\n\nOrder {} is confirmed.\n\n",
            order.customer_name, order.order_number
        );
        for item in items {
            let _ = writeln!(
                text,
                "- {} x{}: {}",
                item_label(item),
                item.quantity,
                format_money(item.line_total_cents(), &order.currency)
            );
        }
        let _ = write!(
            text,
            "\nSubtotal: {}\nShipping: {}\nTax: {}\nTotal: {}\n\nView your order: {}\n",
            format_money(order.subtotal_cents, &order.currency),
            format_money(order.shipping_cents, &order.currency),
            format_money(order.tax_cents, &order.currency),
            format_money(order.total_cents, &order.currency),
            link
        );

        (subject, html, text)
    }

    fn shipping_notification(&self, order: &Order, items: &[LineItem]) -> (String, String, String) {
        let subject = format!(
            "{}: order {} has shipped",
            self.store_name, order.order_number
        );
        let link = self.order_link(order);
        let count: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();

        let mut html = format!(
            "<h1>Your stickers are on the way, {}!</h1><p>Order <strong>{}</strong> ({} item{}) has shipped.</p>",
            escape_html(&order.customer_name),
            escape_html(&order.order_number),
            count,
            if count == 1 { "" } else { "s" }
        );
        let mut text = format!(
            "Your stickers are on the way, {}!\n\nOrder {} ({} item{}) has shipped.\n",
            order.customer_name,
            order.order_number,
            count,
            if count == 1 { "" } else { "s" }
        );

        if let Some(tracking) = &order.tracking_number {
            let _ = write!(
                html,
                "<p>Tracking number: <strong>{}</strong></p>",
                escape_html(tracking)
            );
            let _ = writeln!(text, "Tracking number: {}", tracking);
        }

        let _ = write!(
            html,
            "<p><a href=\"{}\">Track your order</a></p>",
            escape_html(&link)
        );
        let _ = write!(text, "\nTrack your order: {}\n", link);

        (subject, html, text)
    }
}

fn item_label(item: &LineItem) -> String {
    match &item.variant {
        Some(variant) if !variant.is_empty() => format!("{} ({})", item.product_name, variant),
        _ => item.product_name.clone(),
    }
}

/// Format an amount in minor units, e.g. `1234, "USD"` → `$12.34`.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let amount = format!("{}.{:02}", abs / 100, abs % 100);
    match currency {
        "USD" => format!("{}${}", sign, amount),
        "EUR" => format!("{}€{}", sign, amount),
        "GBP" => format!("{}£{}", sign, amount),
        other => format!("{}{} {}", sign, amount, other),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
