//! Outbound email contract.
//!
//! The reset flow only needs a `send_email(to, subject, body)` capability;
//! the actual transport lives behind this trait. `TracingMailer` is the
//! development implementation that writes the message to the log instead of
//! delivering it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Email delivery errors.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Outbound email capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError>;
}

/// Development mailer — logs the message instead of sending it.
#[derive(Debug, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        info!(to, subject, body, "outbound email (not delivered in dev)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_mailer_always_succeeds() {
        let mailer = TracingMailer;
        mailer
            .send_email("alice@example.com", "subject", "body")
            .await
            .unwrap();
    }
}
