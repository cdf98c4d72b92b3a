//! Error types for bellhop.

use thiserror::Error;

use crate::event::RoleType;

/// Errors that can occur while resolving, rendering, or delivering a
/// notification.
///
/// Delivery-path members (`NoActiveTemplate`, `MissingVariable`,
/// `TemplateSyntax`, `SendError`, `TransportError`) never escape a
/// `notify_*` call; the orchestrator folds them into the
/// [`DeliveryReport`](crate::DeliveryReport) and the audit trail.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// Engine has not been configured (global registry is empty).
    #[error("Notifier not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// No active template exists for the requested role.
    ///
    /// Deliberately non-fatal: the orchestrator reports it as a skipped
    /// delivery, never substitutes fallback content.
    #[error("No active template for role `{0}`")]
    NoActiveTemplate(RoleType),

    /// A template referenced a variable absent from the context.
    #[error("Template variable `{0}` is not in the context")]
    MissingVariable(String),

    /// Malformed template pattern (unclosed or stray block, unknown tag).
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// Transport-specific error with details.
    #[error("Transport error ({transport}): {message}")]
    TransportError {
        transport: &'static str,
        message: String,
    },
}

impl NotifyError {
    /// Create a transport-specific error.
    pub fn transport(transport: &'static str, message: impl Into<String>) -> Self {
        Self::TransportError {
            transport,
            message: message.into(),
        }
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for NotifyError {
    fn from(err: lettre::error::Error) -> Self {
        Self::SendError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::SendError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for NotifyError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
