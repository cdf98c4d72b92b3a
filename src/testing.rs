//! Testing utilities and assertion helpers.
//!
//! Pairs with [`LocalTransport`](crate::providers::LocalTransport) for
//! asserting on captured deliveries, and with
//! [`DeliveryReport`](crate::notify::DeliveryReport) for asserting on
//! notify outcomes.
//!
//! # Example
//!
//! ```rust,ignore
//! use bellhop::providers::LocalTransport;
//! use bellhop::testing::*;
//!
//! #[tokio::test]
//! async fn test_confirmation_flow() {
//!     let transport = LocalTransport::new();
//!     let notifier = /* wire a notifier around transport.clone() */;
//!
//!     let report = notifier.notify_booking_event(&booking, &event, None).await;
//!
//!     assert_report_clean(&report, 2);
//!     assert_delivered_to(&transport, "rider@example.com");
//!     refute_delivered_to(&transport, "former-admin@example.com");
//!     assert_subject_contains(&transport, "confirmed");
//! }
//! ```

use crate::event::RoleType;
use crate::notify::DeliveryReport;
use crate::providers::{CapturedEmail, LocalTransport};

// ============================================================================
// Helper Functions
// ============================================================================

/// Format captured deliveries for error messages.
fn format_capture_summary(captured: &[CapturedEmail]) -> String {
    if captured.is_empty() {
        return "  (nothing delivered)".to_string();
    }

    captured
        .iter()
        .enumerate()
        .map(|(i, capture)| {
            let e = &capture.email;
            let to = e
                .to
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let from = e
                .from
                .as_ref()
                .map(|a| a.email.as_str())
                .unwrap_or("<none>");
            format!(
                "  {}. To: [{}], From: {}, Subject: \"{}\"",
                i + 1,
                to,
                from,
                e.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_report(report: &DeliveryReport) -> String {
    let failed = report
        .failed
        .iter()
        .map(|(addr, err)| format!("  {addr}: {err}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "total: {}, succeeded: [{}], failed:\n{}\nno_template: {:?}",
        report.total,
        report.succeeded.join(", "),
        if failed.is_empty() {
            "  (none)".to_string()
        } else {
            failed
        },
        report.no_template
    )
}

// ============================================================================
// Capture Assertions
// ============================================================================

/// Assert that at least one email was delivered.
///
/// # Panics
///
/// Panics if nothing was delivered.
pub fn assert_delivered(transport: &LocalTransport) {
    assert!(
        transport.has_emails(),
        "Expected at least one delivery, but nothing was delivered"
    );
}

/// Assert that nothing was delivered.
///
/// # Panics
///
/// Panics if anything was delivered.
pub fn refute_delivered(transport: &LocalTransport) {
    let captured = transport.emails();
    assert!(
        captured.is_empty(),
        "Expected no deliveries, but {} went out.\n\nDelivered:\n{}",
        captured.len(),
        format_capture_summary(&captured)
    );
}

/// Assert that exactly N emails were delivered.
///
/// # Panics
///
/// Panics if the count doesn't match.
pub fn assert_delivery_count(transport: &LocalTransport, expected: usize) {
    let actual = transport.email_count();
    assert!(
        actual == expected,
        "Expected {} delivery(ies), but {} went out.\n\nDelivered:\n{}",
        expected,
        actual,
        format_capture_summary(&transport.emails())
    );
}

/// Assert that an email was delivered to an address.
///
/// # Panics
///
/// Panics if no delivery reached the address.
pub fn assert_delivered_to(transport: &LocalTransport, email: &str) {
    assert!(
        transport.delivered_to(email),
        "Expected a delivery to '{}'.\n\nDelivered:\n{}",
        email,
        format_capture_summary(&transport.emails())
    );
}

/// Assert that no email was delivered to an address.
///
/// # Panics
///
/// Panics if a delivery reached the address.
pub fn refute_delivered_to(transport: &LocalTransport, email: &str) {
    let matches = transport.deliveries_to(email);
    if let Some(capture) = matches.first() {
        panic!(
            "Expected no delivery to '{}', but found one.\n\nMatching delivery:\n  Subject: \"{}\"\n\nAll deliveries:\n{}",
            email,
            capture.email.subject,
            format_capture_summary(&transport.emails())
        );
    }
}

/// Assert that some delivered email has a subject containing the text.
///
/// # Panics
///
/// Panics if no delivery matches.
pub fn assert_subject_contains(transport: &LocalTransport, text: &str) {
    let captured = transport.emails();
    let found = captured.iter().any(|c| c.email.subject.contains(text));

    assert!(
        found,
        "Expected a delivery with subject containing '{}'.\n\nDelivered:\n{}",
        text,
        format_capture_summary(&captured)
    );
}

/// Assert the most recent delivery's body contains the text. Checks the
/// HTML body first and falls back to the plain-text body.
///
/// # Panics
///
/// Panics if nothing was delivered or the body doesn't contain the text.
pub fn assert_body_contains(transport: &LocalTransport, text: &str) {
    let captured = transport.emails();
    let last = captured
        .first()
        .expect("Expected at least one delivery, but nothing was delivered");
    let body = last
        .email
        .html_body
        .as_deref()
        .or(last.email.text_body.as_deref())
        .unwrap_or("");

    assert!(
        body.contains(text),
        "Expected body to contain '{}', but it didn't.\n\nLast delivery:\n{}\n\nBody (first 500 chars):\n{}",
        text,
        format_capture_summary(&[last.clone()]),
        &body[..body.len().min(500)]
    );
}

/// Get the most recent delivery, or panic if none.
///
/// # Panics
///
/// Panics if nothing was delivered.
pub fn last_delivery(transport: &LocalTransport) -> CapturedEmail {
    transport
        .last_email()
        .expect("Expected at least one delivery, but nothing was delivered")
}

// ============================================================================
// Report Assertions
// ============================================================================

/// Assert a notify call dispatched cleanly: a template was active, every
/// recipient succeeded, and exactly `expected_sent` deliveries were made.
///
/// # Panics
///
/// Panics if the report was skipped, has failures, or the count differs.
pub fn assert_report_clean(report: &DeliveryReport, expected_sent: usize) {
    assert!(
        report.is_clean(),
        "Expected a clean report, got:\n{}",
        format_report(report)
    );
    assert!(
        report.sent() == expected_sent,
        "Expected {} successful delivery(ies), got {}.\n\nReport:\n{}",
        expected_sent,
        report.sent(),
        format_report(report)
    );
}

/// Assert a notify call was skipped because the role had no active
/// template.
///
/// # Panics
///
/// Panics if the call wasn't skipped, was skipped for a different role,
/// or processed any recipient.
pub fn assert_report_skipped(report: &DeliveryReport, role: RoleType) {
    assert!(
        report.no_template == Some(role),
        "Expected the call to be skipped for role '{}', got:\n{}",
        role,
        format_report(report)
    );
    assert!(
        report.total == 0 && report.sent() == 0,
        "Skipped calls must process no recipients, got:\n{}",
        format_report(report)
    );
}

/// Assert a report recorded a failure for an address.
///
/// # Panics
///
/// Panics if the address has no recorded failure.
pub fn assert_report_failed_for(report: &DeliveryReport, email: &str) {
    assert!(
        report.error_for(email).is_some(),
        "Expected a recorded failure for '{}', got:\n{}",
        email,
        format_report(report)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::OutboundEmail;
    use crate::transport::MailTransport;

    #[tokio::test]
    async fn test_capture_assertions() {
        let transport = LocalTransport::new();

        transport
            .deliver(
                &OutboundEmail::new()
                    .from("rides@stark.com")
                    .to("rider@example.com")
                    .subject("Booking BK-1042 confirmed")
                    .html_body("<p>Pickup at 2:30 PM</p>"),
            )
            .await
            .unwrap();

        assert_delivered(&transport);
        assert_delivery_count(&transport, 1);
        assert_delivered_to(&transport, "rider@example.com");
        assert_subject_contains(&transport, "confirmed");
        assert_body_contains(&transport, "2:30 PM");
        refute_delivered_to(&transport, "other@example.com");
        assert_eq!(
            last_delivery(&transport).email.subject,
            "Booking BK-1042 confirmed"
        );
    }

    #[tokio::test]
    #[should_panic(expected = "Expected at least one delivery")]
    async fn test_assert_delivered_fails_when_empty() {
        let transport = LocalTransport::new();
        assert_delivered(&transport);
    }

    #[tokio::test]
    #[should_panic(expected = "Expected no deliveries")]
    async fn test_refute_delivered_fails_after_send() {
        let transport = LocalTransport::new();
        transport
            .deliver(
                &OutboundEmail::new()
                    .from("a@x.com")
                    .to("b@x.com")
                    .subject("Test"),
            )
            .await
            .unwrap();
        refute_delivered(&transport);
    }

    #[test]
    fn test_report_assertions() {
        let clean = DeliveryReport {
            total: 1,
            succeeded: vec!["a@x.com".into()],
            ..DeliveryReport::default()
        };
        assert_report_clean(&clean, 1);

        let failed = DeliveryReport {
            total: 1,
            failed: vec![("a@x.com".into(), "mailbox full".into())],
            ..DeliveryReport::default()
        };
        assert_report_failed_for(&failed, "a@x.com");
    }

    #[test]
    #[should_panic(expected = "Expected the call to be skipped")]
    fn test_skip_assertion_requires_the_marker() {
        assert_report_skipped(&DeliveryReport::default(), RoleType::CustomerBooking);
    }
}
