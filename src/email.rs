//! Outbound email struct with builder pattern.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::Address;

/// A rendered email ready for a transport.
///
/// The orchestrator builds one of these per recipient after rendering;
/// there is deliberately no cc/bcc surface, since every recipient gets its
/// own render, delivery attempt, and audit record.
///
/// ```
/// use bellhop::OutboundEmail;
///
/// let email = OutboundEmail::new()
///     .from(("Dispatch", "dispatch@example.com"))
///     .to("rider@example.com")
///     .subject("Your trip is confirmed")
///     .html_body("<h1>See you at 2:30 PM</h1>");
///
/// assert!(email.is_valid());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Sender address
    pub from: Option<Address>,
    /// Recipient (exactly one per delivery in the engine's usage)
    pub to: Vec<Address>,
    /// Reply-to address
    pub reply_to: Option<Address>,
    /// Email subject line
    pub subject: String,
    /// Plain text body
    pub text_body: Option<String>,
    /// HTML body
    pub html_body: Option<String>,
    /// Custom email headers
    pub headers: HashMap<String, String>,
}

impl OutboundEmail {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    ///
    /// Accepts anything convertible to an [`Address`]:
    /// - `"email@example.com"`
    /// - `("Name", "email@example.com")`
    pub fn from(mut self, addr: impl Into<Address>) -> Self {
        self.from = Some(addr.into());
        self
    }

    /// Add a recipient. Can be called multiple times, though the engine
    /// itself always sends to exactly one.
    pub fn to(mut self, addr: impl Into<Address>) -> Self {
        self.to.push(addr.into());
        self
    }

    /// Replace all recipients.
    pub fn put_to(mut self, addrs: Vec<Address>) -> Self {
        self.to = addrs;
        self
    }

    /// Set the reply-to address.
    pub fn reply_to(mut self, addr: impl Into<Address>) -> Self {
        self.reply_to = Some(addr.into());
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Set the HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check if the email has all required fields for sending.
    pub fn is_valid(&self) -> bool {
        self.from.is_some() && !self.to.is_empty()
    }

    /// The single recipient, when there is exactly one.
    pub fn sole_recipient(&self) -> Option<&Address> {
        match self.to.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let email = OutboundEmail::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Test")
            .text_body("Hello");

        assert_eq!(email.from.unwrap().email, "sender@example.com");
        assert_eq!(email.to.len(), 1);
        assert_eq!(email.to[0].email, "recipient@example.com");
        assert_eq!(email.subject, "Test");
        assert_eq!(email.text_body, Some("Hello".to_string()));
    }

    #[test]
    fn test_with_name() {
        let email = OutboundEmail::new().from(("Alice", "alice@example.com"));

        let from = email.from.unwrap();
        assert_eq!(from.email, "alice@example.com");
        assert_eq!(from.name, Some("Alice".to_string()));
    }

    #[test]
    fn test_is_valid() {
        let invalid = OutboundEmail::new().to("recipient@example.com");
        assert!(!invalid.is_valid());

        let valid = OutboundEmail::new()
            .from("sender@example.com")
            .to("recipient@example.com");
        assert!(valid.is_valid());
    }

    #[test]
    fn test_sole_recipient() {
        let one = OutboundEmail::new().to("a@x.com");
        assert_eq!(one.sole_recipient().unwrap().email, "a@x.com");

        let two = OutboundEmail::new().to("a@x.com").to("b@x.com");
        assert!(two.sole_recipient().is_none());
    }

    #[test]
    fn test_headers() {
        let email = OutboundEmail::new()
            .header("X-Custom", "value")
            .header("X-Priority", "1");

        assert_eq!(email.headers.get("X-Custom"), Some(&"value".to_string()));
        assert_eq!(email.headers.get("X-Priority"), Some(&"1".to_string()));
    }
}
