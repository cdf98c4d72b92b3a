//! Mail transport trait and send receipt types.
//!
//! # Architecture: Why `async_trait`?
//!
//! This module uses `#[async_trait]` instead of native async traits (Rust 1.75+)
//! because the engine requires dynamic dispatch via `Arc<dyn MailTransport>`.
//!
//! Native async traits are not object-safe, so `dyn Trait` is off the table
//! with them. The `async_trait` macro boxes futures, enabling dynamic
//! dispatch at the cost of one heap allocation per call. Email delivery is
//! I/O-bound; network latency dominates the allocation by several orders of
//! magnitude.
//!
//! Dynamic dispatch is what lets the same `Notifier` run against
//! `LocalTransport` in tests and staging, `SmtpTransport` in production,
//! selected at runtime from the environment without recompilation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::email::OutboundEmail;
use crate::error::NotifyError;

/// Receipt for one successful delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Message ID assigned by the transport
    pub message_id: String,
    /// Optional transport-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl SendReceipt {
    /// Create a new receipt with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            raw_response: None,
        }
    }

    /// Create a receipt with the transport's raw response attached.
    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            raw_response: Some(response),
        }
    }
}

/// Trait for mail transports.
///
/// The engine treats delivery as an abstract attempt with a two-outcome
/// result; everything network-shaped lives behind this trait.
///
/// # Example
///
/// ```ignore
/// use bellhop::{OutboundEmail, MailTransport};
/// use bellhop::providers::LocalTransport;
///
/// let transport = LocalTransport::new();
///
/// let email = OutboundEmail::new()
///     .from("dispatch@example.com")
///     .to("rider@example.com")
///     .subject("Hello")
///     .text_body("World");
///
/// let receipt = transport.deliver(&email).await?;
/// println!("Sent with ID: {}", receipt.message_id);
/// ```
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Attempt delivery of a single email.
    ///
    /// Returns the receipt on success. Failures come back as
    /// [`NotifyError`] values; the orchestrator records them per recipient
    /// and never lets them unwind further.
    async fn deliver(&self, email: &OutboundEmail) -> Result<SendReceipt, NotifyError>;

    /// Get the transport name (for logging/audit).
    fn transport_name(&self) -> &'static str {
        "unknown"
    }

    /// Validate configuration.
    ///
    /// Called at wiring time to verify required configuration is present.
    /// Override in transports that require specific config (hosts,
    /// credentials, etc.).
    fn validate_config(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Extension trait for shared pre-send checks.
pub trait MailTransportExt: MailTransport {
    /// Validate an email before sending.
    fn validate(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        if email.from.is_none() {
            return Err(NotifyError::MissingField("from"));
        }
        if email.to.is_empty() {
            return Err(NotifyError::MissingField("to"));
        }
        Ok(())
    }
}

// Auto-implement for all transports, trait objects included
impl<T: MailTransport + ?Sized> MailTransportExt for T {}
