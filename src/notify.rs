//! The delivery orchestrator.
//!
//! [`Notifier`] ties the engine together: for each event it looks up the
//! active template, resolves recipients, builds the context, then renders
//! and delivers once per recipient, recording template statistics and an
//! audit record after every attempt.
//!
//! Two outcomes deserve calling out:
//!
//! - **No active template** is a skip, not an error. The call returns a
//!   [`DeliveryReport`] with its `no_template` marker set and nothing is
//!   sent from any fallback source. Deactivating a role's templates is
//!   how an operator turns that notification off.
//! - **Per-recipient containment.** A render or transport failure is
//!   recorded against that recipient and the loop moves on; it never
//!   aborts the remaining deliveries and never unwinds into the caller's
//!   booking workflow.

use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::address::Address;
use crate::audit::{AuditLog, AuditRecord, MemoryAuditLog, NotificationHistory};
use crate::booking::{Booking, Driver};
use crate::context::{CompanyProfile, ContextBuilder, TemplateContext};
use crate::email::OutboundEmail;
use crate::error::NotifyError;
use crate::event::{BookingEvent, DriverEvent, RoleType};
use crate::render::render;
use crate::resolve::{
    AdminPolicy, RecipientDecision, RecipientResolver, RecipientSelection, ResolvedRecipients,
};
use crate::template::{NotificationTemplate, TemplateStore};
use crate::transport::{MailTransport, MailTransportExt, SendReceipt};

/// Aggregate outcome of one notify call.
///
/// `total` counts recipients processed. A skipped call (no active
/// template) has `total == 0` and `no_template` naming the role that had
/// nothing active; callers treat that as "notification off", never as a
/// failure of the triggering action.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub total: usize,
    /// Addresses delivered to, in resolution order.
    pub succeeded: Vec<String>,
    /// Addresses that failed, with the error text recorded for each.
    pub failed: Vec<(String, String)>,
    /// Set when no active template existed for the role; nothing was sent.
    pub no_template: Option<RoleType>,
}

impl DeliveryReport {
    fn skipped(role: RoleType) -> Self {
        Self {
            no_template: Some(role),
            ..Self::default()
        }
    }

    /// Number of successful deliveries.
    pub fn sent(&self) -> usize {
        self.succeeded.len()
    }

    /// Whether the call was skipped for lack of an active template.
    pub fn is_skipped(&self) -> bool {
        self.no_template.is_some()
    }

    /// Dispatched with every recipient delivered. False for skips.
    pub fn is_clean(&self) -> bool {
        self.no_template.is_none() && self.failed.is_empty()
    }

    /// The recorded error for an address, if it failed.
    pub fn error_for(&self, email: &str) -> Option<&str> {
        self.failed
            .iter()
            .find(|(addr, _)| addr.eq_ignore_ascii_case(email))
            .map(|(_, err)| err.as_str())
    }
}

/// Builder for [`Notifier`]. Template store, transport, company profile,
/// and admin policy are required; the audit log defaults to an in-memory
/// one.
#[derive(Default)]
pub struct NotifierBuilder {
    templates: Option<Arc<dyn TemplateStore>>,
    transport: Option<Arc<dyn MailTransport>>,
    audit: Option<Arc<dyn AuditLog>>,
    policy: Option<AdminPolicy>,
    company: Option<CompanyProfile>,
}

impl NotifierBuilder {
    pub fn templates(mut self, store: impl TemplateStore + 'static) -> Self {
        self.templates = Some(Arc::new(store));
        self
    }

    pub fn transport(mut self, transport: impl MailTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use an already-shared transport, e.g. one built by
    /// [`transport_from_env`](crate::transport_from_env).
    pub fn transport_arc(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn audit(mut self, log: impl AuditLog + 'static) -> Self {
        self.audit = Some(Arc::new(log));
        self
    }

    pub fn admin_policy(mut self, policy: AdminPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn company(mut self, profile: CompanyProfile) -> Self {
        self.company = Some(profile);
        self
    }

    /// Wire everything up, validating the transport's configuration.
    pub fn build(self) -> Result<Notifier, NotifyError> {
        let templates = self
            .templates
            .ok_or_else(|| NotifyError::Configuration("no template store configured".into()))?;
        let transport = self
            .transport
            .ok_or_else(|| NotifyError::Configuration("no transport configured".into()))?;
        let company = self
            .company
            .ok_or_else(|| NotifyError::Configuration("no company profile configured".into()))?;
        let policy = self
            .policy
            .ok_or_else(|| NotifyError::Configuration("no admin policy configured".into()))?;

        transport.validate_config()?;

        Ok(Notifier {
            templates,
            transport,
            audit: self
                .audit
                .unwrap_or_else(|| Arc::new(MemoryAuditLog::new())),
            resolver: RecipientResolver::new(policy),
            context: ContextBuilder::new(company),
        })
    }
}

/// The notification engine's front door.
///
/// ```ignore
/// use bellhop::{
///     AdminPolicy, CompanyProfile, MemoryTemplateStore, Notifier,
/// };
/// use bellhop::providers::LocalTransport;
///
/// let notifier = Notifier::builder()
///     .templates(MemoryTemplateStore::new())
///     .transport(LocalTransport::new())
///     .company(CompanyProfile::new("Stark Limo", "rides@stark.com"))
///     .admin_policy(AdminPolicy::from_env()?)
///     .build()?;
///
/// let report = notifier.notify_booking_event(&booking, &event, None).await;
/// println!("sent {} of {}", report.sent(), report.total);
/// ```
pub struct Notifier {
    templates: Arc<dyn TemplateStore>,
    transport: Arc<dyn MailTransport>,
    audit: Arc<dyn AuditLog>,
    resolver: RecipientResolver,
    context: ContextBuilder,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("resolver", &self.resolver)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn builder() -> NotifierBuilder {
        NotifierBuilder::default()
    }

    pub fn templates(&self) -> &Arc<dyn TemplateStore> {
        &self.templates
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    pub fn resolver(&self) -> &RecipientResolver {
        &self.resolver
    }

    pub fn company(&self) -> &CompanyProfile {
        self.context.company()
    }

    /// Per-booking delivery rollup from the audit log.
    pub fn history(&self, booking_reference: &str) -> NotificationHistory {
        self.audit.history(booking_reference)
    }

    /// Who a booking event would reach under default resolution, with
    /// skip reasons. Backs the operator's pre-send confirmation screen.
    pub fn preview(&self, booking: &Booking, event: &BookingEvent) -> Vec<RecipientDecision> {
        self.resolver.preview(booking, event)
    }

    /// Notify for a booking lifecycle event.
    ///
    /// `selection`, when present, is an operator's forced recipient
    /// choice and replaces preference-based resolution for this call.
    pub async fn notify_booking_event(
        &self,
        booking: &Booking,
        event: &BookingEvent,
        selection: Option<&RecipientSelection>,
    ) -> DeliveryReport {
        let recipients = self.resolver.resolve(booking, event, selection);
        let ctx = match event {
            BookingEvent::New => self.context.admin_booking_context(booking, event),
            BookingEvent::Reminder => self
                .context
                .reminder_context(booking, Local::now().naive_local()),
            _ => self.context.booking_context(booking, event),
        };

        self.dispatch(event.role(), &booking.reference, event.kind(), recipients, &ctx)
            .await
    }

    /// Send the pickup reminder for a booking. Invoked by an external
    /// scheduler; lead time is computed from the wall clock at call time.
    pub async fn notify_reminder(&self, booking: &Booking) -> DeliveryReport {
        self.notify_booking_event(booking, &BookingEvent::Reminder, None)
            .await
    }

    /// Send the trip sheet to a newly assigned driver. The driver is the
    /// only recipient; customers hear about assignments through booking
    /// events.
    pub async fn notify_driver_assignment(
        &self,
        booking: &Booking,
        driver: &Driver,
    ) -> DeliveryReport {
        let ctx = self.context.driver_assignment_context(booking, driver);
        let mut recipients = ResolvedRecipients::new();
        recipients.push(driver.email.clone());

        self.dispatch(
            RoleType::DriverAssignment,
            &booking.reference,
            "driver_assignment",
            recipients,
            &ctx,
        )
        .await
    }

    /// Alert operators that a driver rejected or completed a trip.
    pub async fn notify_admin_driver_event(
        &self,
        booking: &Booking,
        driver: &Driver,
        event: DriverEvent,
        reason: Option<&str>,
    ) -> DeliveryReport {
        let ctx = self.context.admin_driver_context(booking, driver, event, reason);
        let recipients = self.resolver.resolve_admins();

        self.dispatch(
            RoleType::AdminDriver,
            &booking.reference,
            event.kind(),
            recipients,
            &ctx,
        )
        .await
    }

    /// Shared delivery loop: template gate, then render/deliver/record
    /// per recipient.
    async fn dispatch(
        &self,
        role: RoleType,
        reference: &str,
        event_kind: &str,
        recipients: ResolvedRecipients,
        ctx: &TemplateContext,
    ) -> DeliveryReport {
        let span = tracing::info_span!(
            "bellhop.notify",
            booking = %reference,
            event = event_kind,
            transport = self.transport.transport_name(),
        );
        // An entered span guard would not follow the future across its
        // await points and would make it !Send; instrument attaches the
        // span to every poll instead.
        async move {
            let Some(template) = self.templates.active(role) else {
                tracing::warn!(
                    error = %NotifyError::NoActiveTemplate(role),
                    "notification skipped"
                );
                #[cfg(feature = "metrics")]
                count_notification(event_kind, "skipped");
                return DeliveryReport::skipped(role);
            };

            let mut report = DeliveryReport {
                total: recipients.len(),
                ..DeliveryReport::default()
            };

            for recipient in recipients.iter() {
                match self.deliver_one(&template, recipient, ctx).await {
                    Ok(receipt) => {
                        self.templates.record_success(template.id);
                        self.audit.record(AuditRecord::success(
                            reference,
                            &recipient.email,
                            event_kind,
                        ));
                        tracing::debug!(
                            recipient = %recipient.email,
                            message_id = %receipt.message_id,
                            "delivered"
                        );
                        #[cfg(feature = "metrics")]
                        count_delivery("success");
                        report.succeeded.push(recipient.email.clone());
                    }
                    Err(err) => {
                        self.templates.record_failure(template.id);
                        self.audit.record(AuditRecord::failure(
                            reference,
                            &recipient.email,
                            event_kind,
                            err.to_string(),
                        ));
                        tracing::warn!(
                            recipient = %recipient.email,
                            error = %err,
                            "delivery failed"
                        );
                        #[cfg(feature = "metrics")]
                        count_delivery("failure");
                        report.failed.push((recipient.email.clone(), err.to_string()));
                    }
                }
            }

            tracing::info!(
                role = %role,
                sent = report.sent(),
                failed = report.failed.len(),
                "notification dispatched"
            );
            #[cfg(feature = "metrics")]
            count_notification(event_kind, "dispatched");

            report
        }
        .instrument(span)
        .await
    }

    /// Render and deliver to one recipient.
    async fn deliver_one(
        &self,
        template: &NotificationTemplate,
        recipient: &Address,
        ctx: &TemplateContext,
    ) -> Result<SendReceipt, NotifyError> {
        let message = render(template, ctx)?;

        let company = self.context.company();
        let mut email = OutboundEmail::new()
            .from(company.from.clone())
            .to(recipient.clone())
            .subject(message.subject)
            .html_body(message.body);
        if let Some(support) = &company.support_email {
            email = email.reply_to(support.clone());
        }

        self.transport.validate(&email)?;
        self.transport.deliver(&email).await
    }
}

#[cfg(feature = "metrics")]
fn count_notification(event: &str, outcome: &'static str) {
    metrics::counter!(
        "bellhop_notifications_total",
        "event" => event.to_owned(),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(feature = "metrics")]
fn count_delivery(outcome: &'static str) {
    metrics::counter!("bellhop_deliveries_total", "outcome" => outcome).increment(1);
}
