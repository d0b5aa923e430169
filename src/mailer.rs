//! Transactional email.
//!
//! Delivery goes through the Mailgun HTTP API when credentials are configured.
//! Without them messages are only logged, which keeps local setups working.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::MailConfig;

const MAILGUN_API: &str = "https://api.mailgun.net/v3";

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("mail delivery failure simulated")]
    Simulated,
}

/// A rendered message, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// The verification message sent after registration and on resend.
pub fn verification_email(to: &str, base_url: &str, verification_token: &str) -> EmailMessage {
    let link = verification_link(base_url, verification_token);
    EmailMessage {
        to: to.to_string(),
        subject: "Verify your email".to_string(),
        html: format!(
            "<p>Confirm your email address to activate your account.</p>\
             <p><a target=\"_blank\" href=\"{link}\">Click to verify email</a></p>"
        ),
    }
}

pub fn verification_link(base_url: &str, verification_token: &str) -> String {
    format!(
        "{}/users/verify/{verification_token}",
        base_url.trim_end_matches('/')
    )
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// MailgunMailer
///
/// Posts messages to `/<domain>/messages` using HTTP basic auth (`api:<key>`).
#[derive(Clone)]
pub struct MailgunMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl MailgunMailer {
    pub fn new(config: &MailConfig, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{MAILGUN_API}/{}/messages", config.domain),
            api_key: config.api_key.clone(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("html", message.html.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

/// LogMailer
///
/// Writes the message to the log instead of delivering it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html,
            "email delivery disabled, message logged"
        );
        Ok(())
    }
}

/// MockMailer
///
/// Records every message so tests can read verification links back out.
#[derive(Clone, Default)]
pub struct MockMailer {
    pub should_fail: bool,
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Simulated);
        }
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(message);
        }
        Ok(())
    }
}

pub type MailerState = Arc<dyn Mailer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_has_no_double_slash() {
        assert_eq!(
            verification_link("http://localhost:3000/", "abc123"),
            "http://localhost:3000/users/verify/abc123"
        );
    }

    #[test]
    fn test_verification_email_embeds_link() {
        let message = verification_email("alice@example.com", "https://contacts.test", "tok");
        assert_eq!(message.to, "alice@example.com");
        assert!(message.html.contains("https://contacts.test/users/verify/tok"));
    }

    #[tokio::test]
    async fn test_mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        mailer
            .send(verification_email("a@b.co", "http://x.test", "t"))
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);

        let failing = MockMailer::new_failing();
        assert!(failing.send(verification_email("a@b.co", "http://x.test", "t")).await.is_err());
        assert!(failing.sent().is_empty());
    }
}
