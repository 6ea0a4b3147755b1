//! Transactional email delivery.
//!
//! - [`EmailRenderer`] turns an order into the email content for a given [`EmailType`]
//! - [`ResendMailer`] sends rendered messages through the Resend HTTP API
//!
//! [`EmailType`]: printshop_common::types::EmailType

pub mod render;
pub mod resend;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

pub use render::EmailRenderer;
pub use resend::ResendMailer;

/// A fully rendered email ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Email provider is not configured (RESEND_API_KEY is unset)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound email transport.
pub trait EmailSender: Send + Sync {
    /// Send a message, returning the provider's message id.
    fn send(
        &self,
        message: &EmailMessage,
    ) -> impl Future<Output = Result<String, MailerError>> + Send;
}
