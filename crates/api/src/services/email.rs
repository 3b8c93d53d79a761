//! Email delivery for visit notices.
//!
//! Supports two providers:
//! - `console`: logs emails (development)
//! - `sendgrid`: SendGrid v3 mail API
//!
//! The domain composes every message; this service only adds the sender and
//! the footer link, and hands it to the provider.

use async_trait::async_trait;
use domain::services::{EmailDeliveryError, EmailSender, OutboundEmail};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Unknown email provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl From<EmailError> for EmailDeliveryError {
    fn from(err: EmailError) -> Self {
        EmailDeliveryError(err.to_string())
    }
}

#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Sends one message. A disabled service accepts and drops everything.
    pub async fn deliver(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %email.to,
                subject = %email.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        let body = self.body_text(email);
        match self.config.provider.as_str() {
            "console" => {
                self.send_console(email, &body);
                Ok(())
            }
            "sendgrid" => self.send_sendgrid(email, &body).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::UnknownProvider(provider.to_string()))
            }
        }
    }

    fn body_text(&self, email: &OutboundEmail) -> String {
        if self.config.base_url.is_empty() {
            email.body.clone()
        } else {
            format!("{}\n\n{}", email.body, self.config.base_url)
        }
    }

    fn send_console(&self, email: &OutboundEmail, body: &str) {
        info!(
            to = %email.to,
            to_name = ?email.to_name,
            subject = %email.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        debug!(body = %body, "Email body");
    }

    async fn send_sendgrid(&self, email: &OutboundEmail, body: &str) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let mut recipient = json!({ "email": email.to });
        if let Some(name) = &email.to_name {
            recipient["name"] = json!(name);
        }
        let payload = json!({
            "personalizations": [{ "to": [recipient] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": email.subject,
            "content": [{ "type": "text/plain", "value": body }]
        });

        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(to = %email.to, subject = %email.subject, "Email sent via SendGrid");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, error = %error_body, "SendGrid API error");
        Err(EmailError::ProviderError(format!(
            "SendGrid returned {}: {}",
            status, error_body
        )))
    }
}

#[async_trait]
impl EmailSender for EmailService {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailDeliveryError> {
        Ok(self.deliver(email).await?)
    }
}
