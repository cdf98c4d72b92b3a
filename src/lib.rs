//! # Bellhop
//!
//! Booking notifications for transport operators: decide who hears about
//! a booking event, render the operator-managed template for it, deliver
//! one email per recipient, and keep the receipts.
//!
//! ## Quick Start
//!
//! Activate a template per role, wire a [`Notifier`], and fire events at
//! it:
//!
//! ```rust,ignore
//! use bellhop::{
//!     AdminPolicy, BookingEvent, CompanyProfile, MemoryTemplateStore,
//!     NotificationTemplate, Notifier, RoleType,
//! };
//!
//! let store = MemoryTemplateStore::new();
//! store.insert(
//!     NotificationTemplate::new(RoleType::CustomerBooking, "Confirmation v1")
//!         .subject("Booking {{ booking_reference }} confirmed")
//!         .body("Hi {{ passenger_name }}, see you at {{ pick_up_time }}.")
//!         .active(true),
//! );
//!
//! let notifier = Notifier::builder()
//!     .templates(store)
//!     .transport_arc(bellhop::transport_from_env()?)
//!     .company(CompanyProfile::from_env()?)
//!     .admin_policy(AdminPolicy::from_env()?)
//!     .build()?;
//!
//! let report = notifier
//!     .notify_booking_event(&booking, &BookingEvent::Confirmed, None)
//!     .await;
//! println!("sent {} of {}", report.sent(), report.total);
//! ```
//!
//! Deactivating a role's templates turns that notification off: the call
//! returns a skipped report and nothing is sent from any fallback.
//!
//! ## Global Notifier
//!
//! For apps that notify from many call sites, configure once and use the
//! crate-level functions:
//!
//! ```rust,ignore
//! bellhop::configure(notifier);
//!
//! // anywhere, later:
//! let report = bellhop::notify_booking_event(&booking, &event, None).await?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `BELLHOP_TRANSPORT` | `smtp`, `local`, `logger`, `logger_full` |
//! | `COMPANY_NAME` | Company display name shown in templates |
//! | `EMAIL_FROM` | Sender address |
//! | `EMAIL_FROM_NAME` | Sender display name |
//! | `SUPPORT_EMAIL` | Reply-to and template support contact |
//! | `SUPPORT_PHONE` | Template support contact |
//! | `BASE_URL` | Public site root for template links |
//! | `ADMIN_EMAIL` | Admin inbox for the single-inbox policy |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default: 587) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//!
//! ## Feature Flags
//!
//! - `smtp` - SMTP transport via lettre
//! - `metrics` - Prometheus-style counters
//! - `full` - Everything above
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit Prometheus-style metrics:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `bellhop_notifications_total` | Counter | event, outcome | Notify calls, `dispatched` or `skipped` |
//! | `bellhop_deliveries_total` | Counter | outcome | Per-recipient delivery attempts |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the bellhop crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod address;
pub mod audit;
pub mod booking;
pub mod context;
pub mod email;
pub mod error;
pub mod event;
pub mod notify;
pub mod providers;
pub mod render;
pub mod resolve;
pub mod template;
pub mod testing;
pub mod transport;

use parking_lot::RwLock;
use std::env;
use std::sync::Arc;

// Re-exports
pub use address::{Address, RecipientList};
pub use audit::{AuditLog, AuditQuery, AuditRecord, MemoryAuditLog, NotificationHistory};
pub use booking::{Booking, BookingStatus, Driver, LinkedLeg, PreferenceSet, TripType, VehicleType};
pub use context::{CompanyProfile, ContextBuilder, ContextValue, TemplateContext};
pub use email::OutboundEmail;
pub use error::NotifyError;
pub use event::{BookingEvent, DriverEvent, PreferenceCategory, RoleType};
pub use notify::{DeliveryReport, Notifier, NotifierBuilder};
pub use render::{render, render_str, RenderedMessage};
pub use resolve::{
    AdminContact, AdminPolicy, RecipientDecision, RecipientResolver, RecipientRole,
    RecipientSelection, ResolvedRecipients, SkipReason,
};
pub use template::{MemoryTemplateStore, NotificationTemplate, TemplateStats, TemplateStore};
pub use transport::{MailTransport, MailTransportExt, SendReceipt};

// ============================================================================
// Global Notifier Configuration
// ============================================================================

/// Global notifier - swappable for testing
static NOTIFIER: RwLock<Option<Arc<Notifier>>> = RwLock::new(None);

fn global() -> Result<Arc<Notifier>, NotifyError> {
    NOTIFIER
        .read()
        .as_ref()
        .cloned()
        .ok_or(NotifyError::NotConfigured)
}

/// Manually configure the global notifier.
///
/// Can be called multiple times - later calls replace the previous
/// notifier.
///
/// ```rust,ignore
/// bellhop::configure(notifier);
/// ```
pub fn configure(notifier: Notifier) {
    let mut guard = NOTIFIER.write();
    *guard = Some(Arc::new(notifier));
}

/// Configure with an Arc'd notifier.
pub fn configure_arc(notifier: Arc<Notifier>) {
    let mut guard = NOTIFIER.write();
    *guard = Some(notifier);
}

/// Reset the global notifier (useful for tests).
pub fn reset() {
    let mut guard = NOTIFIER.write();
    *guard = None;
}

/// Get a handle to the configured notifier (if any).
pub fn notifier() -> Option<Arc<Notifier>> {
    NOTIFIER.read().as_ref().cloned()
}

/// Whether a global notifier has been configured.
pub fn is_configured() -> bool {
    NOTIFIER.read().is_some()
}

/// Notify for a booking lifecycle event via the global notifier.
///
/// Errors only when no global notifier is configured; delivery outcomes
/// live in the returned [`DeliveryReport`].
pub async fn notify_booking_event(
    booking: &Booking,
    event: &BookingEvent,
    selection: Option<&RecipientSelection>,
) -> Result<DeliveryReport, NotifyError> {
    Ok(global()?
        .notify_booking_event(booking, event, selection)
        .await)
}

/// Send the pickup reminder for a booking via the global notifier.
pub async fn notify_reminder(booking: &Booking) -> Result<DeliveryReport, NotifyError> {
    Ok(global()?.notify_reminder(booking).await)
}

/// Send a driver their trip sheet via the global notifier.
pub async fn notify_driver_assignment(
    booking: &Booking,
    driver: &Driver,
) -> Result<DeliveryReport, NotifyError> {
    Ok(global()?.notify_driver_assignment(booking, driver).await)
}

/// Alert operators about a driver event via the global notifier.
pub async fn notify_admin_driver_event(
    booking: &Booking,
    driver: &Driver,
    event: DriverEvent,
    reason: Option<&str>,
) -> Result<DeliveryReport, NotifyError> {
    Ok(global()?
        .notify_admin_driver_event(booking, driver, event, reason)
        .await)
}

// ============================================================================
// Environment Wiring
// ============================================================================

/// Pick a transport when `BELLHOP_TRANSPORT` is unset.
fn detect_transport() -> &'static str {
    #[cfg(feature = "smtp")]
    if env::var("SMTP_HOST").is_ok() {
        return "smtp";
    }
    "local"
}

/// Build a mail transport from environment variables.
///
/// `BELLHOP_TRANSPORT` selects the transport; when unset, `smtp` is
/// chosen if the feature is enabled and `SMTP_HOST` is present, falling
/// back to `local`.
pub fn transport_from_env() -> Result<Arc<dyn MailTransport>, NotifyError> {
    let transport = match env::var("BELLHOP_TRANSPORT") {
        Ok(t) => t.to_lowercase(),
        Err(_) => {
            let detected = detect_transport();
            tracing::debug!(transport = detected, "auto-detected mail transport");
            detected.to_string()
        }
    };

    match transport.as_str() {
        #[cfg(feature = "smtp")]
        "smtp" => {
            let host = env::var("SMTP_HOST")
                .map_err(|_| NotifyError::Configuration("SMTP_HOST not set".into()))?;
            let port: u16 = env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .unwrap_or(587);
            let username = env::var("SMTP_USERNAME").unwrap_or_default();
            let password = env::var("SMTP_PASSWORD").unwrap_or_default();

            let smtp = if username.is_empty() {
                providers::SmtpTransport::new(&host, port).build()
            } else {
                providers::SmtpTransport::new(&host, port)
                    .credentials(&username, &password)
                    .build()
            };
            Ok(Arc::new(smtp))
        }
        #[cfg(not(feature = "smtp"))]
        "smtp" => Err(NotifyError::Configuration(
            "BELLHOP_TRANSPORT=smtp but 'smtp' feature is not enabled. \
            Add `features = [\"smtp\"]` to Cargo.toml"
                .into(),
        )),

        "local" => Ok(Arc::new(providers::LocalTransport::new())),
        "logger" => Ok(Arc::new(providers::LoggerTransport::new())),
        "logger_full" => Ok(Arc::new(providers::LoggerTransport::full())),

        _ => Err(NotifyError::Configuration(format!(
            "Unknown BELLHOP_TRANSPORT: {}. Valid transports are: smtp, local, logger, logger_full",
            transport
        ))),
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Address;
    pub use crate::AdminPolicy;
    pub use crate::Booking;
    pub use crate::BookingEvent;
    pub use crate::BookingStatus;
    pub use crate::CompanyProfile;
    pub use crate::DeliveryReport;
    pub use crate::Driver;
    pub use crate::DriverEvent;
    pub use crate::MailTransport;
    pub use crate::NotificationTemplate;
    pub use crate::Notifier;
    pub use crate::NotifyError;
    pub use crate::PreferenceSet;
    pub use crate::RecipientSelection;
    pub use crate::RoleType;
    pub use crate::TemplateStore;
    pub use crate::{
        notify_admin_driver_event, notify_booking_event, notify_driver_assignment, notify_reminder,
        transport_from_env,
    };
}
