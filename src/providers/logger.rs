//! Logger transport that only logs emails.
//!
//! Useful for staging environments or when you want to see what would be sent
//! without actually sending or storing emails.

use async_trait::async_trait;

use crate::email::OutboundEmail;
use crate::error::NotifyError;
use crate::transport::{MailTransport, SendReceipt};

/// Transport that emits tracing events for emails.
pub struct LoggerTransport {
    /// If true, log full email details. If false, just log recipient summary.
    log_full: bool,
}

impl LoggerTransport {
    /// Create a logger transport with brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger transport with full email details.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log full email details.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

impl Default for LoggerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for LoggerTransport {
    async fn deliver(&self, email: &OutboundEmail) -> Result<SendReceipt, NotifyError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                to = ?email.to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                subject = %email.subject,
                has_html = email.html_body.is_some(),
                has_text = email.text_body.is_some(),
                "Email logged (full)"
            );

            // Also log bodies at debug level
            if let Some(ref text) = email.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = email.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
                subject = %email.subject,
                "Email logged"
            );
        }

        Ok(SendReceipt::new(message_id))
    }

    fn transport_name(&self) -> &'static str {
        "logger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    #[tokio::test]
    async fn test_logger_brief() {
        let transport = LoggerTransport::new();

        let email = OutboundEmail::new()
            .from(Address::new("sender@example.com"))
            .to(Address::new("recipient@example.com"))
            .subject("Test Subject")
            .text_body("Hello, World!");

        let receipt = transport.deliver(&email).await.unwrap();
        assert!(!receipt.message_id.is_empty());
    }

    #[tokio::test]
    async fn test_logger_full() {
        let transport = LoggerTransport::full();

        let email = OutboundEmail::new()
            .from(Address::with_name("Alice", "alice@example.com"))
            .to(Address::new("bob@example.com"))
            .subject("Test Subject")
            .text_body("Plain text")
            .html_body("<p>HTML</p>");

        let receipt = transport.deliver(&email).await.unwrap();
        assert!(!receipt.message_id.is_empty());
    }

    #[tokio::test]
    async fn test_logger_builder() {
        let transport = LoggerTransport::new().log_full(true);
        assert!(transport.log_full);

        let transport = LoggerTransport::new().log_full(false);
        assert!(!transport.log_full);
    }

    #[test]
    fn test_transport_name() {
        let transport = LoggerTransport::new();
        assert_eq!(transport.transport_name(), "logger");
    }
}
