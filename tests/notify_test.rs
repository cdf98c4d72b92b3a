//! End-to-end delivery tests.
//!
//! Wires a real `Notifier` against the in-memory template store, the
//! local capture transport, and the in-memory audit log, then drives
//! booking events through the full resolve/render/deliver path.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use bellhop::providers::LocalTransport;
use bellhop::testing::*;
use bellhop::{
    AdminContact, AdminPolicy, AuditLog, AuditQuery, Booking, BookingEvent, BookingStatus,
    CompanyProfile, Driver, DriverEvent, LinkedLeg, MemoryAuditLog, MemoryTemplateStore,
    NotificationTemplate, Notifier, PreferenceSet, RecipientList, RecipientRole,
    RecipientSelection, RoleType, TemplateStore,
};

// =============================================================================
// Fixtures
// =============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Confirmed airport run with a distinct passenger email on file.
fn booking() -> Booking {
    Booking::new("BK-1042", "amy@example.com", date(2026, 1, 20), time(14, 30))
        .passenger("Amy Santiago")
        .passenger_email("ray@example.com")
        .pickup_address("99 Precinct Ave, Brooklyn")
        .dropoff_address("JFK Terminal 4")
        .status(BookingStatus::Confirmed)
}

fn company() -> CompanyProfile {
    CompanyProfile::new("Stark Limo", ("Stark Limo", "rides@starklimo.com"))
        .support_email("support@starklimo.com")
        .support_phone("(212) 555-0170")
        .base_url("https://starklimo.com")
}

fn confirmation_template() -> NotificationTemplate {
    NotificationTemplate::new(RoleType::CustomerBooking, "Booking update v1")
        .subject("Your booking {{ booking_reference }} is {{ status }}")
        .body(
            "<p>Hi {{ passenger_name }},</p>\
             <p>Pickup on {{ pick_up_date }} at {{ pick_up_time }}.</p>\
             <p>{{ company_name }}</p>",
        )
        .active(true)
}

/// Notifier over the given store/transport/audit trio, single admin inbox.
fn notifier(
    store: Arc<MemoryTemplateStore>,
    transport: LocalTransport,
    audit: Arc<MemoryAuditLog>,
) -> Notifier {
    Notifier::builder()
        .templates(store)
        .transport(transport)
        .audit(audit)
        .company(company())
        .admin_policy(AdminPolicy::Always("ops@starklimo.com".into()))
        .build()
        .unwrap()
}

fn full_setup() -> (Arc<MemoryTemplateStore>, LocalTransport, Arc<MemoryAuditLog>, Notifier) {
    let store = MemoryTemplateStore::shared();
    let transport = LocalTransport::new();
    let audit = MemoryAuditLog::shared();
    let engine = notifier(Arc::clone(&store), transport.clone(), Arc::clone(&audit));
    (store, transport, audit, engine)
}

// =============================================================================
// Booking Events
// =============================================================================

#[tokio::test]
async fn confirmation_reaches_admin_owner_and_passenger() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());

    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_report_clean(&report, 3);
    assert_delivery_count(&transport, 3);
    assert_delivered_to(&transport, "ops@starklimo.com");
    assert_delivered_to(&transport, "amy@example.com");
    assert_delivered_to(&transport, "ray@example.com");
    assert_subject_contains(&transport, "BK-1042");
    assert_subject_contains(&transport, "Confirmed");
}

#[tokio::test]
async fn rendered_email_carries_company_sender_and_reply_to() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());

    engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    let delivery = last_delivery(&transport);
    let from = delivery.email.from.as_ref().unwrap();
    assert_eq!(from.email, "rides@starklimo.com");
    assert_eq!(from.name.as_deref(), Some("Stark Limo"));

    let reply_to = delivery.email.reply_to.as_ref().unwrap();
    assert_eq!(reply_to.email, "support@starklimo.com");

    let body = delivery.email.html_body.as_ref().unwrap();
    assert!(body.contains("Hi Amy Santiago"));
    assert!(body.contains("Jan 20, 2026"));
    assert!(body.contains("2:30 PM"));
}

// =============================================================================
// Template Gating
// =============================================================================

#[tokio::test]
async fn missing_template_skips_the_notification() {
    let (_store, transport, audit, engine) = full_setup();

    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_report_skipped(&report, RoleType::CustomerBooking);
    refute_delivered(&transport);
    assert_eq!(audit.count(), 0);
}

#[tokio::test]
async fn deactivated_template_turns_the_notification_off() {
    let (store, transport, _audit, engine) = full_setup();
    let id = store.insert(confirmation_template());

    assert!(store.deactivate(id));
    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_report_skipped(&report, RoleType::CustomerBooking);
    refute_delivered(&transport);
}

#[tokio::test]
async fn other_roles_templates_never_stand_in() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::AdminBooking, "Admin alert")
            .subject("New booking {{ booking_reference }}")
            .body("<p>{{ booking_reference }}</p>")
            .active(true),
    );

    // A confirmation needs the customer_booking role; the admin template
    // being active must not leak into it.
    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_report_skipped(&report, RoleType::CustomerBooking);
    refute_delivered(&transport);
}

// =============================================================================
// Failure Containment
// =============================================================================

#[tokio::test]
async fn transport_failure_for_one_recipient_leaves_the_rest_delivered() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());
    transport.fail_for("amy@example.com", "mailbox full");

    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_eq!(report.total, 3);
    assert_eq!(report.sent(), 2);
    assert_report_failed_for(&report, "amy@example.com");
    assert!(report.error_for("amy@example.com").unwrap().contains("mailbox full"));

    assert_delivered_to(&transport, "ops@starklimo.com");
    assert_delivered_to(&transport, "ray@example.com");
    refute_delivered_to(&transport, "amy@example.com");
}

#[tokio::test]
async fn render_failure_fails_each_recipient_without_aborting_the_run() {
    let (store, transport, audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::CustomerBooking, "Broken template")
            .subject("Driver {{ driver_name }} assigned")
            .body("<p>{{ driver_name }} will pick you up.</p>")
            .active(true),
    );

    // No driver on the booking, so every render hits the missing key.
    let report = engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    assert_eq!(report.total, 3);
    assert_eq!(report.sent(), 0);
    assert_eq!(report.failed.len(), 3);
    refute_delivered(&transport);

    let rows = audit.query(&AuditQuery::new().booking("BK-1042"));
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| !r.success));
    assert!(rows[0].error.as_ref().unwrap().contains("driver_name"));
}

// =============================================================================
// Audit Trail
// =============================================================================

#[tokio::test]
async fn every_attempt_lands_in_the_audit_log() {
    let (store, transport, audit, engine) = full_setup();
    store.insert(confirmation_template());
    transport.fail_for("amy@example.com", "mailbox full");

    engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    let rows = audit.query(&AuditQuery::new().booking("BK-1042"));
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.success).count(), 2);

    let failure = rows.iter().find(|r| !r.success).unwrap();
    assert_eq!(failure.recipient, "amy@example.com");
    assert_eq!(failure.event, "confirmed");
    assert!(failure.error.as_ref().unwrap().contains("mailbox full"));

    let history = engine.history("BK-1042");
    assert_eq!(history.total, 3);
    assert_eq!(history.succeeded, 2);
    assert_eq!(history.failed, 1);
}

// =============================================================================
// Template Stats
// =============================================================================

#[tokio::test]
async fn delivery_outcomes_feed_template_stats() {
    let (store, transport, _audit, engine) = full_setup();
    let id = store.insert(confirmation_template());
    transport.fail_for("amy@example.com", "mailbox full");

    engine
        .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
        .await;

    let stats = store.stats(id).unwrap();
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate(), 66.7);
    assert!(stats.last_sent_at.is_some());
}

// =============================================================================
// Round Trips
// =============================================================================

#[tokio::test]
async fn round_trip_renders_return_leg_fields() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::CustomerBooking, "Round trip v1")
            .subject("Booking {{ booking_reference }}")
            .body(
                "<p>Out: {{ pick_up_date }} at {{ pick_up_time }}</p>\
                 {% if has_return %}<p>Back: {{ return_pick_up_date }} at \
                 {{ return_pick_up_time }}</p>{% endif %}",
            )
            .active(true),
    );

    let trip = booking().linked_leg(LinkedLeg::new("BK-1043", date(2026, 1, 22), time(9, 0)));
    let report = engine
        .notify_booking_event(&trip, &BookingEvent::Confirmed, None)
        .await;

    assert_report_clean(&report, 3);
    assert_body_contains(&transport, "Back: Jan 22, 2026 at 9:00 AM");
}

// =============================================================================
// Reminders
// =============================================================================

#[tokio::test]
async fn reminder_goes_through_the_reminder_role() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::CustomerReminder, "Pickup reminder")
            .subject("Reminder: pickup at {{ pick_up_time }}")
            .body("<p>Your car arrives at {{ pick_up_time }} ({{ hours_until_pickup }}h).</p>")
            .active(true),
    );

    let report = engine.notify_reminder(&booking()).await;

    assert_report_clean(&report, 3);
    assert_subject_contains(&transport, "Reminder: pickup at 2:30 PM");
}

#[tokio::test]
async fn reminder_preference_silences_the_owner_only() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::CustomerReminder, "Pickup reminder")
            .subject("Reminder for {{ booking_reference }}")
            .body("<p>{{ pick_up_time }}</p>")
            .active(true),
    );

    let muted = booking().owner_notifies(PreferenceSet::all().pickup_reminders(false));
    let report = engine.notify_reminder(&muted).await;

    // Admin and passenger still hear about it.
    assert_report_clean(&report, 2);
    assert_delivered_to(&transport, "ops@starklimo.com");
    assert_delivered_to(&transport, "ray@example.com");
    refute_delivered_to(&transport, "amy@example.com");
}

// =============================================================================
// Driver Flows
// =============================================================================

#[tokio::test]
async fn driver_assignment_reaches_only_the_driver() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(
        NotificationTemplate::new(RoleType::DriverAssignment, "Trip sheet")
            .subject("Trip {{ booking_reference }} assigned to you")
            .body(
                "<p>Pickup {{ pick_up_date }} {{ pick_up_time }} at {{ pick_up_address }}.</p>\
                 {% if special_requests %}<p>Note: {{ special_requests }}</p>{% endif %}",
            )
            .active(true),
    );

    let driver = Driver::new("Happy Hogan", "happy@starklimo.com").phone("(212) 555-0181");
    let trip = booking().notes("Booster seat needed").driver(driver.clone());
    let report = engine.notify_driver_assignment(&trip, &driver).await;

    assert_report_clean(&report, 1);
    assert_delivered_to(&transport, "happy@starklimo.com");
    refute_delivered_to(&transport, "amy@example.com");
    refute_delivered_to(&transport, "ops@starklimo.com");
    assert_body_contains(&transport, "Note: Booster seat needed");
}

#[tokio::test]
async fn driver_rejection_alerts_every_active_admin() {
    let store = MemoryTemplateStore::shared();
    let transport = LocalTransport::new();
    let audit = MemoryAuditLog::shared();
    let engine = Notifier::builder()
        .templates(Arc::clone(&store))
        .transport(transport.clone())
        .audit(Arc::clone(&audit))
        .company(company())
        .admin_policy(AdminPolicy::Directory {
            primary: Some("ops@starklimo.com".into()),
            contacts: vec![
                AdminContact::new("Maria", "maria@starklimo.com"),
                AdminContact::new("Jake", "jake@starklimo.com")
                    .notifies(PreferenceSet::none()),
                AdminContact::new("Retired", "retired@starklimo.com").active(false),
            ],
        })
        .build()
        .unwrap();

    store.insert(
        NotificationTemplate::new(RoleType::AdminDriver, "Driver alert")
            .subject("Driver update on {{ booking_reference }}")
            .body(
                "<p>{{ driver_name }}: {{ event }}</p>\
                 {% if reason %}<p>Reason: {{ reason }}</p>{% endif %}",
            )
            .active(true),
    );

    let driver = Driver::new("Happy Hogan", "happy@starklimo.com");
    let report = engine
        .notify_admin_driver_event(
            &booking(),
            &driver,
            DriverEvent::Rejected,
            Some("vehicle in the shop"),
        )
        .await;

    // Driver problems reach the fixed inbox and broadcast past
    // per-contact booking preferences, but never past the active flag.
    assert_report_clean(&report, 3);
    assert_delivered_to(&transport, "ops@starklimo.com");
    assert_delivered_to(&transport, "maria@starklimo.com");
    assert_delivered_to(&transport, "jake@starklimo.com");
    refute_delivered_to(&transport, "retired@starklimo.com");
    assert_body_contains(&transport, "Reason: vehicle in the shop");

    let rows = audit.query(&AuditQuery::new().event("driver_rejection"));
    assert_eq!(rows.len(), 3);
}

// =============================================================================
// Operator Overrides
// =============================================================================

#[tokio::test]
async fn explicit_selection_replaces_preference_resolution() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());

    let opted_out = booking().owner_notifies(PreferenceSet::none());

    // Default resolution would skip the owner.
    let decisions = engine.preview(&opted_out, &BookingEvent::Confirmed);
    let owner = decisions
        .iter()
        .find(|d| d.role == RecipientRole::Owner)
        .unwrap();
    assert!(!owner.included);

    // A forced resend overrides the preference and drops everyone else.
    let selection = RecipientSelection::default().with_owner();
    let report = engine
        .notify_booking_event(&opted_out, &BookingEvent::Confirmed, Some(&selection))
        .await;

    assert_report_clean(&report, 1);
    assert_delivered_to(&transport, "amy@example.com");
    refute_delivered_to(&transport, "ops@starklimo.com");
    refute_delivered_to(&transport, "ray@example.com");
}

// =============================================================================
// Preview
// =============================================================================

#[tokio::test]
async fn preview_matches_an_actual_send() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());

    let trip = booking().additional_recipients(RecipientList::from_raw("boss@example.com"));
    let event = BookingEvent::Confirmed;

    let mut promised: Vec<String> = engine
        .preview(&trip, &event)
        .into_iter()
        .filter(|d| d.included)
        .filter_map(|d| d.address.map(|a| a.email))
        .collect();

    engine.notify_booking_event(&trip, &event, None).await;

    let mut delivered: Vec<String> = transport
        .emails()
        .into_iter()
        .flat_map(|c| c.email.to)
        .map(|a| a.email)
        .collect();

    promised.sort();
    delivered.sort();
    assert_eq!(promised, delivered);
}

#[tokio::test]
async fn zero_recipients_is_a_clean_run_not_a_skip() {
    let store = MemoryTemplateStore::shared();
    let transport = LocalTransport::new();
    let engine = Notifier::builder()
        .templates(Arc::clone(&store))
        .transport(transport.clone())
        .company(company())
        .admin_policy(AdminPolicy::Directory {
            primary: None,
            contacts: vec![],
        })
        .build()
        .unwrap();
    store.insert(confirmation_template());

    let solo = Booking::new("BK-2001", "solo@example.com", date(2026, 3, 1), time(10, 0))
        .status(BookingStatus::Cancelled)
        .owner_notifies(PreferenceSet::none());
    let report = engine
        .notify_booking_event(&solo, &BookingEvent::Cancelled, None)
        .await;

    assert!(!report.is_skipped());
    assert!(report.is_clean());
    assert_eq!(report.total, 0);
    refute_delivered(&transport);
}

// =============================================================================
// Scheduling
// =============================================================================

// Reminder dispatch runs from an external scheduler, so the notify
// futures have to be spawnable onto a runtime.
#[tokio::test]
async fn notify_calls_can_run_on_spawned_tasks() {
    let (store, transport, _audit, engine) = full_setup();
    store.insert(confirmation_template());
    let engine = Arc::new(engine);

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .notify_booking_event(&booking(), &BookingEvent::Confirmed, None)
                .await
        }
    });

    let report = handle.await.unwrap();
    assert_report_clean(&report, 3);
    assert_delivery_count(&transport, 3);
}
