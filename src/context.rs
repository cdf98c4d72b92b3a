//! Template contexts: the flat, display-ready variable maps handed to the
//! renderer, and the builder that derives them from booking snapshots.
//!
//! Two rules hold for every context:
//! - values are pre-formatted for display (no internal status codes, no
//!   seconds in times, no raw enum names);
//! - missing optional values are omitted entirely, never inserted as
//!   empty strings or a `None` placeholder.
//!
//! Boolean facts are stored as flags, always present, so templates can gate
//! blocks on them without caring whether the underlying data existed.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use crate::address::Address;
use crate::booking::{Booking, BookingStatus, Driver};
use crate::error::NotifyError;
use crate::event::{BookingEvent, DriverEvent};

/// A single context entry: display text or a boolean flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Text(String),
    Flag(bool),
}

impl ContextValue {
    /// The substitution form used by `{{ var }}`.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Flag(flag) => flag.to_string(),
        }
    }

    /// Truthiness used by `{% if var %}`: set flags and non-empty text.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(text) => !text.is_empty(),
            Self::Flag(flag) => *flag,
        }
    }
}

/// String-keyed map of display-ready values. Iteration order is
/// deterministic (sorted by key), which keeps logs and tests stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateContext {
    values: BTreeMap<String, ContextValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a text value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), ContextValue::Text(value.into()));
    }

    /// Insert a text value only when present; `None` leaves the key out.
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Insert a boolean flag.
    pub fn flag(&mut self, key: impl Into<String>, value: bool) {
        self.values.insert(key.into(), ContextValue::Flag(value));
    }

    /// Chainable [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Chainable [`flag`](Self::flag).
    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.flag(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// Text value for a key, when the key holds text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ContextValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Truthiness of a key; absent keys are falsy.
    pub fn truthy(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(ContextValue::is_truthy)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}

/// Company identity woven into every notification: sender address,
/// support contacts, and site links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    /// Sender for all outbound notifications.
    pub from: Address,
    pub support_email: Option<Address>,
    pub support_phone: Option<String>,
    pub base_url: Option<String>,
}

impl CompanyProfile {
    pub fn new(name: impl Into<String>, from: impl Into<Address>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            support_email: None,
            support_phone: None,
            base_url: None,
        }
    }

    pub fn support_email(mut self, email: impl Into<Address>) -> Self {
        self.support_email = Some(email.into());
        self
    }

    pub fn support_phone(mut self, phone: impl Into<String>) -> Self {
        self.support_phone = Some(phone.into());
        self
    }

    /// Public site root, without a trailing slash.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.base_url = Some(url);
        self
    }

    /// Operator dashboard link derived from the base URL.
    pub fn dashboard_url(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{base}/dashboard"))
    }

    /// Build a profile from the environment.
    ///
    /// | Variable | Required | Meaning |
    /// |----------|----------|---------|
    /// | `COMPANY_NAME` | yes | Display name |
    /// | `EMAIL_FROM` | yes | Sender address |
    /// | `EMAIL_FROM_NAME` | no | Sender display name |
    /// | `SUPPORT_EMAIL` | no | Support contact |
    /// | `SUPPORT_PHONE` | no | Support contact |
    /// | `BASE_URL` | no | Public site root |
    pub fn from_env() -> Result<Self, NotifyError> {
        let name = env::var("COMPANY_NAME")
            .map_err(|_| NotifyError::Configuration("COMPANY_NAME not set".into()))?;
        let from_email = env::var("EMAIL_FROM")
            .map_err(|_| NotifyError::Configuration("EMAIL_FROM not set".into()))?;

        let from = match env::var("EMAIL_FROM_NAME") {
            Ok(from_name) => Address::parse_with_name(&from_name, &from_email)?,
            Err(_) => Address::parse(&from_email)?,
        };

        let mut profile = Self::new(name, from);
        if let Ok(support) = env::var("SUPPORT_EMAIL") {
            profile.support_email = Some(Address::parse(&support)?);
        }
        if let Ok(phone) = env::var("SUPPORT_PHONE") {
            profile.support_phone = Some(phone);
        }
        if let Ok(base) = env::var("BASE_URL") {
            profile = profile.base_url(base);
        }
        Ok(profile)
    }
}

/// Builds per-role template contexts from booking snapshots.
///
/// Pure given its inputs: reminder lead times take the clock as an
/// argument instead of reading it.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    company: CompanyProfile,
}

impl ContextBuilder {
    pub fn new(company: CompanyProfile) -> Self {
        Self { company }
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    /// Context for customer-facing booking events (confirmed, cancelled,
    /// status changes). Adds `event` and, for status changes, `old_status`.
    pub fn booking_context(&self, booking: &Booking, event: &BookingEvent) -> TemplateContext {
        let mut ctx = self.base_context(booking);
        ctx.set("event", event.kind());
        ctx.set_opt("old_status", event.old_status().map(|s| s.label()));
        ctx
    }

    /// Context for pickup reminders. `now` is wall-clock local time in the
    /// booking's timezone.
    pub fn reminder_context(&self, booking: &Booking, now: NaiveDateTime) -> TemplateContext {
        let mut ctx = self.base_context(booking);
        ctx.set("event", BookingEvent::Reminder.kind());

        let hours = (booking.pickup_datetime() - now).num_hours().max(0);
        ctx.set("hours_until_pickup", hours.to_string());
        ctx
    }

    /// Context for the driver's trip sheet.
    pub fn driver_assignment_context(
        &self,
        booking: &Booking,
        driver: &Driver,
    ) -> TemplateContext {
        let mut ctx = self.base_context(booking);
        ctx.set("event", "driver_assignment");
        Self::driver_fields(&mut ctx, driver);
        // The trip sheet calls booking notes "special requests".
        ctx.set_opt("special_requests", booking.notes.as_deref());
        ctx
    }

    /// Context for operator alerts about incoming bookings.
    pub fn admin_booking_context(
        &self,
        booking: &Booking,
        event: &BookingEvent,
    ) -> TemplateContext {
        let mut ctx = self.base_context(booking);
        ctx.set("event", event.kind());
        ctx.flag("action_needed", booking.driver.is_none());
        ctx
    }

    /// Context for operator alerts about driver events.
    pub fn admin_driver_context(
        &self,
        booking: &Booking,
        driver: &Driver,
        event: DriverEvent,
        reason: Option<&str>,
    ) -> TemplateContext {
        let mut ctx = self.base_context(booking);
        ctx.set("event", event.kind());
        Self::driver_fields(&mut ctx, driver);
        ctx.set_opt("reason", reason);
        ctx
    }

    /// Keys shared by every role: booking identity, trip details, company
    /// contacts, status flags, and round-trip/driver blocks.
    fn base_context(&self, booking: &Booking) -> TemplateContext {
        let mut ctx = TemplateContext::new();

        ctx.set("booking_reference", &booking.reference);
        ctx.set("owner_email", &booking.owner_email.email);
        if !booking.passenger_name.is_empty() {
            ctx.set("passenger_name", &booking.passenger_name);
        }
        ctx.set_opt(
            "passenger_email",
            booking.passenger_email.as_ref().map(|a| a.email.clone()),
        );
        ctx.set_opt("passenger_phone", booking.passenger_phone.as_deref());

        ctx.set("pick_up_date", format_date(booking.pickup_date));
        ctx.set("pick_up_time", format_time(booking.pickup_time));
        ctx.set_opt("pick_up_address", booking.pickup_address.as_deref());
        ctx.set_opt("drop_off_address", booking.dropoff_address.as_deref());

        ctx.set("vehicle_type", booking.vehicle_type.label());
        ctx.set("trip_type", booking.trip_type.label());
        ctx.set("number_of_passengers", booking.passenger_count.to_string());
        ctx.set_opt("flight_number", booking.flight_number.as_deref());
        ctx.set_opt("hours_booked", booking.hours_booked.map(|h| h.to_string()));
        ctx.set_opt("notes", booking.notes.as_deref());

        ctx.set("status", booking.status.label());
        ctx.flag("is_pending", booking.status == BookingStatus::Pending);
        ctx.flag("is_confirmed", booking.status == BookingStatus::Confirmed);
        ctx.flag(
            "is_cancelled",
            matches!(
                booking.status,
                BookingStatus::Cancelled | BookingStatus::CancelledFullCharge
            ),
        );
        ctx.flag("is_completed", booking.status == BookingStatus::TripCompleted);

        ctx.flag("is_round_trip", booking.is_round_trip());
        self.return_fields(&mut ctx, booking);

        if let Some(driver) = &booking.driver {
            Self::driver_fields(&mut ctx, driver);
        } else {
            ctx.flag("has_driver", false);
        }

        ctx.set("company_name", &self.company.name);
        ctx.set_opt(
            "support_email",
            self.company.support_email.as_ref().map(|a| a.email.clone()),
        );
        ctx.set_opt("support_phone", self.company.support_phone.as_deref());
        ctx.set_opt("website_url", self.company.base_url.as_deref());
        ctx.set_opt("dashboard_url", self.company.dashboard_url());

        ctx
    }

    /// Return-leg keys. An outbound leg shows its linked return leg; a
    /// return leg shows itself, so either leg's template can print the
    /// same `return_*` block.
    fn return_fields(&self, ctx: &mut TemplateContext, booking: &Booking) {
        if booking.is_return_leg {
            ctx.flag("has_return", true);
            ctx.set("return_pick_up_date", format_date(booking.pickup_date));
            ctx.set("return_pick_up_time", format_time(booking.pickup_time));
            ctx.set_opt("return_pick_up_address", booking.pickup_address.as_deref());
            ctx.set_opt("return_drop_off_address", booking.dropoff_address.as_deref());
        } else if let Some(leg) = &booking.linked_leg {
            ctx.flag("has_return", true);
            ctx.set("return_pick_up_date", format_date(leg.pickup_date));
            ctx.set("return_pick_up_time", format_time(leg.pickup_time));
            ctx.set_opt("return_pick_up_address", leg.pickup_address.as_deref());
            ctx.set_opt("return_drop_off_address", leg.dropoff_address.as_deref());
        } else {
            ctx.flag("has_return", false);
        }
    }

    fn driver_fields(ctx: &mut TemplateContext, driver: &Driver) {
        ctx.flag("has_driver", true);
        ctx.set("driver_name", &driver.name);
        ctx.set("driver_email", &driver.email.email);
        ctx.set_opt("driver_phone", driver.phone.as_deref());
        ctx.set_opt("driver_vehicle", driver.vehicle.as_deref());
    }
}

/// `Jan 20, 2026`: abbreviated month, no zero-padded day.
fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `2:30 PM`: 12-hour clock, no seconds, no zero-padded hour.
fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::LinkedLeg;
    use chrono::{NaiveDate, NaiveTime};

    fn builder() -> ContextBuilder {
        ContextBuilder::new(
            CompanyProfile::new("Stark Limo", ("Stark Limo", "rides@stark.com"))
                .support_email("support@stark.com")
                .support_phone("(212) 555-0100")
                .base_url("https://rides.stark.com/"),
        )
    }

    fn booking() -> Booking {
        Booking::new(
            "BK-1042",
            "amy@x.com",
            NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        )
        .passenger("Amy Santiago")
        .pickup_address("99 Precinct Ave")
        .status(BookingStatus::Confirmed)
    }

    // ==== Formatting ====

    #[test]
    fn dates_are_abbreviated_without_padding() {
        assert_eq!(
            format_date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
            "Jan 5, 2026"
        );
        assert_eq!(
            format_date(NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()),
            "Dec 25, 2026"
        );
    }

    #[test]
    fn times_are_twelve_hour_without_seconds() {
        assert_eq!(format_time(NaiveTime::from_hms_opt(14, 30, 0).unwrap()), "2:30 PM");
        assert_eq!(format_time(NaiveTime::from_hms_opt(9, 5, 0).unwrap()), "9:05 AM");
        assert_eq!(format_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), "12:00 AM");
    }

    // ==== Base context ====

    #[test]
    fn base_values_are_display_ready() {
        let ctx = builder().booking_context(&booking(), &BookingEvent::Confirmed);

        assert_eq!(ctx.text("booking_reference"), Some("BK-1042"));
        assert_eq!(ctx.text("pick_up_date"), Some("Jan 20, 2026"));
        assert_eq!(ctx.text("pick_up_time"), Some("2:30 PM"));
        assert_eq!(ctx.text("status"), Some("Confirmed"));
        assert_eq!(ctx.text("trip_type"), Some("Point-to-Point"));
        assert_eq!(ctx.text("company_name"), Some("Stark Limo"));
        assert_eq!(ctx.text("support_email"), Some("support@stark.com"));
        assert_eq!(ctx.text("website_url"), Some("https://rides.stark.com"));
        assert_eq!(
            ctx.text("dashboard_url"),
            Some("https://rides.stark.com/dashboard")
        );
    }

    #[test]
    fn missing_optionals_are_omitted_not_blank() {
        let ctx = builder().booking_context(&booking(), &BookingEvent::Confirmed);

        assert!(!ctx.contains("drop_off_address"));
        assert!(!ctx.contains("flight_number"));
        assert!(!ctx.contains("notes"));
        assert!(!ctx.contains("passenger_email"));
        assert!(!ctx.contains("old_status"));
    }

    #[test]
    fn flags_are_always_present() {
        let ctx = builder().booking_context(&booking(), &BookingEvent::Confirmed);

        assert!(ctx.truthy("is_confirmed"));
        assert!(!ctx.truthy("is_cancelled"));
        assert!(ctx.contains("has_driver"));
        assert!(!ctx.truthy("has_driver"));
        assert!(ctx.contains("has_return"));
        assert!(!ctx.truthy("has_return"));
    }

    #[test]
    fn status_change_includes_old_status_label() {
        let ctx = builder().booking_context(
            &booking().status(BookingStatus::TripCompleted),
            &BookingEvent::StatusChanged {
                old_status: BookingStatus::Confirmed,
            },
        );

        assert_eq!(ctx.text("event"), Some("status_change"));
        assert_eq!(ctx.text("old_status"), Some("Confirmed"));
        assert_eq!(ctx.text("status"), Some("Trip Completed"));
        assert!(ctx.truthy("is_completed"));
    }

    // ==== Round trips ====

    #[test]
    fn outbound_leg_carries_linked_return_fields() {
        let outbound = booking().linked_leg(
            LinkedLeg::new(
                "BK-1042R",
                NaiveDate::from_ymd_opt(2026, 1, 22).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )
            .pickup_address("JFK Terminal 4"),
        );

        let ctx = builder().booking_context(&outbound, &BookingEvent::Confirmed);

        assert!(ctx.truthy("has_return"));
        assert!(ctx.truthy("is_round_trip"));
        // Own fields and return fields under distinct keys
        assert_eq!(ctx.text("pick_up_date"), Some("Jan 20, 2026"));
        assert_eq!(ctx.text("return_pick_up_date"), Some("Jan 22, 2026"));
        assert_eq!(ctx.text("return_pick_up_time"), Some("9:00 AM"));
        assert_eq!(ctx.text("return_pick_up_address"), Some("JFK Terminal 4"));
    }

    #[test]
    fn return_leg_describes_itself() {
        let ctx = builder().booking_context(
            &booking().return_leg(true),
            &BookingEvent::Confirmed,
        );

        assert!(ctx.truthy("has_return"));
        assert_eq!(ctx.text("return_pick_up_date"), Some("Jan 20, 2026"));
        assert_eq!(ctx.text("return_pick_up_time"), Some("2:30 PM"));
    }

    // ==== Driver fields ====

    #[test]
    fn assigned_driver_fields_appear() {
        let with_driver = booking().driver(
            Driver::new("Happy Hogan", "happy@stark.com")
                .phone("(917) 555-0199")
                .vehicle("Black Suburban #12"),
        );

        let ctx = builder().booking_context(&with_driver, &BookingEvent::Confirmed);

        assert!(ctx.truthy("has_driver"));
        assert_eq!(ctx.text("driver_name"), Some("Happy Hogan"));
        assert_eq!(ctx.text("driver_phone"), Some("(917) 555-0199"));
        assert_eq!(ctx.text("driver_vehicle"), Some("Black Suburban #12"));
    }

    // ==== Per-role contexts ====

    #[test]
    fn reminder_context_computes_lead_hours() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let ctx = builder().reminder_context(&booking(), now);

        assert_eq!(ctx.text("event"), Some("reminder"));
        assert_eq!(ctx.text("hours_until_pickup"), Some("2"));
    }

    #[test]
    fn reminder_lead_hours_never_go_negative() {
        let after_pickup = NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let ctx = builder().reminder_context(&booking(), after_pickup);

        assert_eq!(ctx.text("hours_until_pickup"), Some("0"));
    }

    #[test]
    fn driver_assignment_context_uses_the_passed_driver() {
        let driver = Driver::new("Happy Hogan", "happy@stark.com");
        let ctx = builder().driver_assignment_context(&booking(), &driver);

        assert_eq!(ctx.text("event"), Some("driver_assignment"));
        assert_eq!(ctx.text("driver_name"), Some("Happy Hogan"));
        assert!(!ctx.contains("special_requests"));

        let ctx = builder()
            .driver_assignment_context(&booking().notes("Two car seats"), &driver);
        assert_eq!(ctx.text("special_requests"), Some("Two car seats"));
    }

    #[test]
    fn admin_booking_context_flags_unassigned_bookings() {
        let ctx = builder().admin_booking_context(&booking(), &BookingEvent::New);
        assert_eq!(ctx.text("event"), Some("new"));
        assert!(ctx.truthy("action_needed"));

        let assigned = booking().driver(Driver::new("Happy", "happy@stark.com"));
        let ctx = builder().admin_booking_context(&assigned, &BookingEvent::New);
        assert!(!ctx.truthy("action_needed"));
    }

    #[test]
    fn admin_driver_context_carries_event_and_reason() {
        let driver = Driver::new("Happy Hogan", "happy@stark.com");
        let ctx = builder().admin_driver_context(
            &booking(),
            &driver,
            DriverEvent::Rejected,
            Some("Vehicle in the shop"),
        );

        assert_eq!(ctx.text("event"), Some("driver_rejection"));
        assert_eq!(ctx.text("reason"), Some("Vehicle in the shop"));

        let ctx =
            builder().admin_driver_context(&booking(), &driver, DriverEvent::Completed, None);
        assert_eq!(ctx.text("event"), Some("driver_completion"));
        assert!(!ctx.contains("reason"));
    }

    // ==== CompanyProfile ====

    #[test]
    fn base_url_is_normalized() {
        let profile = CompanyProfile::new("Limo", "a@b.co").base_url("https://x.com///");
        assert_eq!(profile.base_url.as_deref(), Some("https://x.com"));
        assert_eq!(profile.dashboard_url().as_deref(), Some("https://x.com/dashboard"));
    }

    #[test]
    fn dashboard_url_absent_without_base() {
        let profile = CompanyProfile::new("Limo", "a@b.co");
        assert_eq!(profile.dashboard_url(), None);
    }
}
