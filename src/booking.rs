//! Read-only booking, driver, and preference snapshots.
//!
//! The engine never mutates these; the booking workflow hands them over at
//! notification time and keeps ownership of persistence and state
//! transitions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::{Address, RecipientList};
use crate::event::PreferenceCategory;

/// Booking status, with display labels suitable for customer-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    CancelledFullCharge,
    CustomerNoShow,
    TripNotCovered,
    TripCompleted,
}

impl BookingStatus {
    /// Human-readable label. Templates only ever see these, never the
    /// internal variant names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Cancelled => "Cancelled",
            Self::CancelledFullCharge => "Cancelled (Full Charge)",
            Self::CustomerNoShow => "Customer No-Show",
            Self::TripNotCovered => "Trip Not Covered",
            Self::TripCompleted => "Trip Completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trip type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    #[default]
    PointToPoint,
    RoundTrip,
    Hourly,
}

impl TripType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PointToPoint => "Point-to-Point",
            Self::RoundTrip => "Round Trip",
            Self::Hourly => "Hourly",
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Vehicle class requested on the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    #[default]
    Sedan,
    Suv,
    SprinterVan,
    Other,
}

impl VehicleType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sedan => "Sedan",
            Self::Suv => "SUV",
            Self::SprinterVan => "Sprinter Van",
            Self::Other => "Others",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_true() -> bool {
    true
}

/// Per-owner notification preferences, one flag per category.
/// Every category defaults to enabled; opting out is the exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSet {
    #[serde(default = "default_true")]
    pub booking_confirmations: bool,
    #[serde(default = "default_true")]
    pub status_updates: bool,
    #[serde(default = "default_true")]
    pub pickup_reminders: bool,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            booking_confirmations: true,
            status_updates: true,
            pickup_reminders: true,
        }
    }
}

impl PreferenceSet {
    /// All categories enabled.
    pub fn all() -> Self {
        Self::default()
    }

    /// All categories disabled.
    pub fn none() -> Self {
        Self {
            booking_confirmations: false,
            status_updates: false,
            pickup_reminders: false,
        }
    }

    pub fn booking_confirmations(mut self, enabled: bool) -> Self {
        self.booking_confirmations = enabled;
        self
    }

    pub fn status_updates(mut self, enabled: bool) -> Self {
        self.status_updates = enabled;
        self
    }

    pub fn pickup_reminders(mut self, enabled: bool) -> Self {
        self.pickup_reminders = enabled;
        self
    }

    /// Whether the given category is enabled.
    pub fn allows(&self, category: PreferenceCategory) -> bool {
        match category {
            PreferenceCategory::BookingConfirmations => self.booking_confirmations,
            PreferenceCategory::StatusUpdates => self.status_updates,
            PreferenceCategory::PickupReminders => self.pickup_reminders,
        }
    }
}

/// The assigned driver, as much of it as templates and recipients need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    pub email: Address,
    pub phone: Option<String>,
    /// Vehicle descriptor shown to the customer, e.g. "Black Suburban #12".
    pub vehicle: Option<String>,
}

impl Driver {
    pub fn new(name: impl Into<String>, email: impl Into<Address>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
            vehicle: None,
        }
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn vehicle(mut self, vehicle: impl Into<String>) -> Self {
        self.vehicle = Some(vehicle.into());
        self
    }
}

/// The paired leg of a round trip, carrying only what return-leg context
/// keys need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedLeg {
    pub reference: String,
    pub status: BookingStatus,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub pickup_address: Option<String>,
    pub dropoff_address: Option<String>,
}

impl LinkedLeg {
    pub fn new(
        reference: impl Into<String>,
        pickup_date: NaiveDate,
        pickup_time: NaiveTime,
    ) -> Self {
        Self {
            reference: reference.into(),
            status: BookingStatus::Pending,
            pickup_date,
            pickup_time,
            pickup_address: None,
            dropoff_address: None,
        }
    }

    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn pickup_address(mut self, addr: impl Into<String>) -> Self {
        self.pickup_address = Some(addr.into());
        self
    }

    pub fn dropoff_address(mut self, addr: impl Into<String>) -> Self {
        self.dropoff_address = Some(addr.into());
        self
    }
}

/// One trip leg, snapshotted at notification time.
///
/// # Examples
///
/// ```
/// use bellhop::{Booking, BookingStatus};
/// use chrono::{NaiveDate, NaiveTime};
///
/// let booking = Booking::new(
///     "BK-1042",
///     "amy@example.com",
///     NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
///     NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
/// )
/// .passenger("Amy Santiago")
/// .pickup_address("99 Precinct Ave")
/// .status(BookingStatus::Confirmed);
///
/// assert_eq!(booking.reference, "BK-1042");
/// assert!(booking.send_passenger_notifications);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub reference: String,
    pub owner_email: Address,
    pub owner_notifies: PreferenceSet,
    pub passenger_name: String,
    pub passenger_email: Option<Address>,
    pub passenger_phone: Option<String>,
    pub send_passenger_notifications: bool,
    pub additional_recipients: RecipientList,
    pub status: BookingStatus,
    pub trip_type: TripType,
    pub vehicle_type: VehicleType,
    pub passenger_count: u32,
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
    pub pickup_address: Option<String>,
    pub dropoff_address: Option<String>,
    pub flight_number: Option<String>,
    pub hours_booked: Option<u32>,
    pub notes: Option<String>,
    pub is_return_leg: bool,
    pub linked_leg: Option<LinkedLeg>,
    pub driver: Option<Driver>,
}

impl Booking {
    /// Create a booking snapshot with the required core fields. Everything
    /// else has workflow defaults and builder setters.
    pub fn new(
        reference: impl Into<String>,
        owner_email: impl Into<Address>,
        pickup_date: NaiveDate,
        pickup_time: NaiveTime,
    ) -> Self {
        Self {
            reference: reference.into(),
            owner_email: owner_email.into(),
            owner_notifies: PreferenceSet::default(),
            passenger_name: String::new(),
            passenger_email: None,
            passenger_phone: None,
            send_passenger_notifications: true,
            additional_recipients: RecipientList::new(),
            status: BookingStatus::Pending,
            trip_type: TripType::default(),
            vehicle_type: VehicleType::default(),
            passenger_count: 1,
            pickup_date,
            pickup_time,
            pickup_address: None,
            dropoff_address: None,
            flight_number: None,
            hours_booked: None,
            notes: None,
            is_return_leg: false,
            linked_leg: None,
            driver: None,
        }
    }

    pub fn owner_notifies(mut self, prefs: PreferenceSet) -> Self {
        self.owner_notifies = prefs;
        self
    }

    pub fn passenger(mut self, name: impl Into<String>) -> Self {
        self.passenger_name = name.into();
        self
    }

    pub fn passenger_email(mut self, email: impl Into<Address>) -> Self {
        self.passenger_email = Some(email.into());
        self
    }

    pub fn passenger_phone(mut self, phone: impl Into<String>) -> Self {
        self.passenger_phone = Some(phone.into());
        self
    }

    pub fn send_passenger_notifications(mut self, send: bool) -> Self {
        self.send_passenger_notifications = send;
        self
    }

    pub fn additional_recipients(mut self, list: RecipientList) -> Self {
        self.additional_recipients = list;
        self
    }

    pub fn status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = trip_type;
        self
    }

    pub fn vehicle_type(mut self, vehicle_type: VehicleType) -> Self {
        self.vehicle_type = vehicle_type;
        self
    }

    pub fn passenger_count(mut self, count: u32) -> Self {
        self.passenger_count = count;
        self
    }

    pub fn pickup_address(mut self, addr: impl Into<String>) -> Self {
        self.pickup_address = Some(addr.into());
        self
    }

    pub fn dropoff_address(mut self, addr: impl Into<String>) -> Self {
        self.dropoff_address = Some(addr.into());
        self
    }

    pub fn flight_number(mut self, flight: impl Into<String>) -> Self {
        self.flight_number = Some(flight.into());
        self
    }

    pub fn hours_booked(mut self, hours: u32) -> Self {
        self.hours_booked = Some(hours);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn return_leg(mut self, is_return: bool) -> Self {
        self.is_return_leg = is_return;
        self
    }

    pub fn linked_leg(mut self, leg: LinkedLeg) -> Self {
        self.linked_leg = Some(leg);
        self
    }

    pub fn driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Pickup date and time combined, for reminder lead-time math.
    pub fn pickup_datetime(&self) -> NaiveDateTime {
        self.pickup_date.and_time(self.pickup_time)
    }

    /// Whether this booking participates in a round trip (either leg).
    pub fn is_round_trip(&self) -> bool {
        self.trip_type == TripType::RoundTrip || self.is_return_leg || self.linked_leg.is_some()
    }
}
