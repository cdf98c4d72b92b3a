//! Local transport for development and testing.
//!
//! Captures emails in memory for programmatic assertions instead of
//! sending them anywhere.
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use bellhop::providers::LocalTransport;
//! use bellhop::testing::*;
//!
//! #[tokio::test]
//! async fn test_sends_confirmation() {
//!     let transport = LocalTransport::new();
//!     let notifier = test_notifier(transport.clone());
//!
//!     notifier.notify_booking_event(&booking, &BookingEvent::Confirmed, None).await;
//!
//!     assert_delivered_to(&transport, "rider@example.com");
//!     assert_subject_contains(&transport, "Confirmed");
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::email::OutboundEmail;
use crate::error::NotifyError;
use crate::transport::{MailTransport, SendReceipt};

/// An email captured by the local transport, with its assigned id and
/// capture timestamp.
#[derive(Debug, Clone)]
pub struct CapturedEmail {
    pub id: String,
    pub email: OutboundEmail,
    pub delivered_at: DateTime<Utc>,
}

struct LocalInner {
    emails: RwLock<Vec<CapturedEmail>>,
    /// If set, every deliver() returns this error.
    fail_all: RwLock<Option<String>>,
    /// Per-address failures, keyed by lowercased recipient.
    fail_addrs: RwLock<HashMap<String, String>>,
}

/// Transport that stores emails in memory.
///
/// Clones share the same capture store, so a test can hand one clone to the
/// notifier and keep another for assertions.
pub struct LocalTransport {
    inner: Arc<LocalInner>,
}

impl LocalTransport {
    /// Create a new local transport with a fresh capture store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LocalInner {
                emails: RwLock::new(Vec::new()),
                fail_all: RwLock::new(None),
                fail_addrs: RwLock::new(HashMap::new()),
            }),
        }
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Configure the transport to fail every delivery with this message.
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.inner.fail_all.write() = Some(message.into());
    }

    /// Configure the transport to fail deliveries to one address only,
    /// leaving other recipients deliverable. This is how tests exercise
    /// per-recipient failure containment.
    pub fn fail_for(&self, address: &str, message: impl Into<String>) {
        self.inner
            .fail_addrs
            .write()
            .insert(address.to_lowercase(), message.into());
    }

    /// Clear all configured failures, global and per-address.
    pub fn clear_failures(&self) {
        *self.inner.fail_all.write() = None;
        self.inner.fail_addrs.write().clear();
    }

    // =========================================================================
    // Email Access (for testing assertions)
    // =========================================================================

    /// Get all captured emails (newest first).
    pub fn emails(&self) -> Vec<CapturedEmail> {
        let mut all = self.inner.emails.read().clone();
        all.reverse();
        all
    }

    /// Get the most recently captured email.
    pub fn last_email(&self) -> Option<CapturedEmail> {
        self.inner.emails.read().last().cloned()
    }

    /// Get the count of captured emails.
    pub fn email_count(&self) -> usize {
        self.inner.emails.read().len()
    }

    /// Check if any email was captured.
    pub fn has_emails(&self) -> bool {
        self.email_count() > 0
    }

    /// Clear all captured emails.
    pub fn clear(&self) {
        self.inner.emails.write().clear();
    }

    /// Remove and return all captured emails (newest first).
    ///
    /// Useful for multi-phase tests where one phase's emails must not
    /// affect the next phase's assertions.
    pub fn flush(&self) -> Vec<CapturedEmail> {
        let mut drained: Vec<CapturedEmail> =
            self.inner.emails.write().drain(..).collect();
        drained.reverse();
        drained
    }

    // =========================================================================
    // Query Helpers (for testing)
    // =========================================================================

    /// Check if an email was captured for a specific address.
    pub fn delivered_to(&self, email: &str) -> bool {
        self.inner.emails.read().iter().any(|captured| {
            captured
                .email
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// All captured emails addressed to one recipient (newest first).
    pub fn deliveries_to(&self, email: &str) -> Vec<CapturedEmail> {
        let mut found: Vec<CapturedEmail> = self
            .inner
            .emails
            .read()
            .iter()
            .filter(|captured| {
                captured
                    .email
                    .to
                    .iter()
                    .any(|addr| addr.email.eq_ignore_ascii_case(email))
            })
            .cloned()
            .collect();
        found.reverse();
        found
    }

    /// Check if an email with exactly this subject was captured.
    pub fn sent_with_subject(&self, subject: &str) -> bool {
        self.inner
            .emails
            .read()
            .iter()
            .any(|captured| captured.email.subject == subject)
    }

    /// Check if an email with a subject containing this text was captured.
    pub fn sent_with_subject_containing(&self, text: &str) -> bool {
        self.inner
            .emails
            .read()
            .iter()
            .any(|captured| captured.email.subject.contains(text))
    }

    /// Find captured emails matching a predicate (newest first).
    pub fn find_emails<F>(&self, predicate: F) -> Vec<CapturedEmail>
    where
        F: Fn(&OutboundEmail) -> bool,
    {
        let mut found: Vec<CapturedEmail> = self
            .inner
            .emails
            .read()
            .iter()
            .filter(|captured| predicate(&captured.email))
            .cloned()
            .collect();
        found.reverse();
        found
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LocalTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl MailTransport for LocalTransport {
    async fn deliver(&self, email: &OutboundEmail) -> Result<SendReceipt, NotifyError> {
        if let Some(message) = self.inner.fail_all.read().clone() {
            return Err(NotifyError::transport("local", message));
        }

        {
            let fail_addrs = self.inner.fail_addrs.read();
            if !fail_addrs.is_empty() {
                for addr in &email.to {
                    if let Some(message) = fail_addrs.get(&addr.email.to_lowercase()) {
                        return Err(NotifyError::transport("local", message.clone()));
                    }
                }
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.inner.emails.write().push(CapturedEmail {
            id: id.clone(),
            email: email.clone(),
            delivered_at: Utc::now(),
        });

        Ok(SendReceipt::new(id))
    }

    fn transport_name(&self) -> &'static str {
        "local"
    }
}
