//! Email-delivery seam.
//!
//! The domain only composes messages and hands them to an [`EmailSender`]
//! after the owning transaction has committed. Delivery failures are logged
//! and swallowed; they never undo a transition.

use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Email delivery failure reported by a sender.
#[derive(Debug, Error)]
#[error("Email delivery failed: {0}")]
pub struct EmailDeliveryError(pub String);

/// One composed message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
}

/// External email-delivery collaborator.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailDeliveryError>;
}

/// How queued emails leave the process once a transition commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Detached task per batch; the caller does not wait.
    #[default]
    Background,
    /// Awaited before the operation returns (still after commit).
    Inline,
}

/// Emails collected during a transaction, sent only after commit.
#[derive(Debug, Default)]
#[must_use]
pub struct Outbox {
    emails: Vec<OutboundEmail>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, email: OutboundEmail) {
        self.emails.push(email);
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Hands every queued email to `sender`. Never fails.
    pub async fn deliver(self, sender: Arc<dyn EmailSender>, mode: DeliveryMode) {
        if self.is_empty() {
            return;
        }
        tracing::debug!(count = self.len(), ?mode, "Delivering queued emails");
        match mode {
            DeliveryMode::Inline => send_all(sender, self.emails).await,
            DeliveryMode::Background => {
                tokio::spawn(send_all(sender, self.emails));
            }
        }
    }
}

async fn send_all(sender: Arc<dyn EmailSender>, emails: Vec<OutboundEmail>) {
    for email in emails {
        match sender.send(&email).await {
            Ok(()) => tracing::debug!(to = %email.to, subject = %email.subject, "Email sent"),
            Err(e) => tracing::warn!(
                to = %email.to,
                subject = %email.subject,
                error = %e,
                "Email delivery failed; transition already committed"
            ),
        }
    }
}

/// Mock sender for development and testing.
///
/// Records every message it is given, and can simulate failures.
#[derive(Debug, Clone, Default)]
pub struct MockEmailSender {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock sender that fails every delivery.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Messages accepted so far (attempted ones when failing).
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.sent()
            .into_iter()
            .filter(|e| e.to == address)
            .collect()
    }
}

#[async_trait::async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailDeliveryError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());

        if self.simulate_failure {
            tracing::warn!(to = %email.to, "Mock email sender simulating failure");
            return Err(EmailDeliveryError("Simulated failure".to_string()));
        }

        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Mock: Would send email"
        );
        Ok(())
    }
}
