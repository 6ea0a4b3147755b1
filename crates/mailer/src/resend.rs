//! Resend HTTP API client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{EmailMessage, EmailSender, MailerError};

/// Maximum number of response body characters kept in a rejection error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Sends email through `POST {base_url}/emails`.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendMailer {
    /// Create a mailer. Without an API key every send fails with
    /// [`MailerError::NotConfigured`] and no request is made.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl EmailSender for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String, MailerError> {
        let api_key = self.api_key.as_deref().ok_or(MailerError::NotConfigured)?;

        let request = SendEmailRequest {
            from: &message.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let sent: SendEmailResponse = response.json().await?;
        tracing::debug!(provider_id = %sent.id, to = %message.to, "Email accepted by Resend");
        Ok(sent.id)
    }
}
