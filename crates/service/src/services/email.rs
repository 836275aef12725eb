//! Email sender trait, message templates and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use common::Email;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Settings;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Email,
    pub subject: String,
    pub html_content: String,
}

/// Returned when an email cannot be delivered.
#[derive(Debug, Clone, Error)]
#[error("Failed to send email to {to}: {reason}")]
pub struct EmailError {
    pub to: Email,
    pub reason: String,
}

/// Trait for outgoing email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers a single message.
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Builds the welcome email for a new account.
pub fn new_account_email(settings: &Settings, email_to: &Email) -> EmailMessage {
    let project = &settings.project_name;
    EmailMessage {
        to: email_to.clone(),
        subject: format!("{project} - New account for user {email_to}"),
        html_content: format!(
            "<p>Welcome to {project}, {email_to}!</p>\
             <p><a href=\"{}\">Go to the dashboard</a></p>",
            settings.frontend_host
        ),
    }
}

/// Builds the password recovery email carrying a reset token.
pub fn reset_password_email(settings: &Settings, email_to: &Email, token: &str) -> EmailMessage {
    let project = &settings.project_name;
    let valid_hours = settings.email_reset_token_expire_hours;
    EmailMessage {
        to: email_to.clone(),
        subject: format!("{project} - Password recovery for user {email_to}"),
        html_content: format!(
            "<p>Hello {email_to},</p>\
             <p><a href=\"{}/reset-password?token={token}\">Reset your password</a></p>\
             <p>The link is valid for {valid_hours} hours.</p>",
            settings.frontend_host
        ),
    }
}

#[derive(Debug, Default)]
struct InMemoryEmailState {
    sent: Vec<EmailMessage>,
    fail_on_send: bool,
}

/// In-memory email sender for testing and local runs.
///
/// Records every delivered message instead of talking to a mail server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailSender {
    state: Arc<RwLock<InMemoryEmailState>>,
}

impl InMemoryEmailSender {
    /// Creates a new in-memory email sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sender to fail every delivery.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Returns the messages delivered so far, oldest first.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.state.read().await.sent.clone()
    }

    /// Returns the messages delivered to `to`.
    pub async fn sent_to(&self, to: &Email) -> Vec<EmailMessage> {
        self.state
            .read()
            .await
            .sent
            .iter()
            .filter(|message| message.to == *to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let mut state = self.state.write().await;

        if state.fail_on_send {
            return Err(EmailError {
                to: message.to,
                reason: "delivery disabled".to_string(),
            });
        }

        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        state.sent.push(message);
        Ok(())
    }
}
