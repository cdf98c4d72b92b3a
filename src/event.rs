//! Event vocabulary: booking lifecycle events, driver events, template
//! roles, and the preference categories that gate owner delivery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::booking::BookingStatus;
use crate::error::NotifyError;

/// Template role. Exactly one template per role is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Customer-facing booking updates (confirmed, cancelled, status change).
    CustomerBooking,
    /// Customer-facing pickup reminders.
    CustomerReminder,
    /// Trip sheet sent to the assigned driver.
    DriverAssignment,
    /// Operator alert for incoming bookings.
    AdminBooking,
    /// Operator alert for driver rejection/completion events.
    AdminDriver,
}

impl RoleType {
    /// Stable string form used in audit records and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerBooking => "customer_booking",
            Self::CustomerReminder => "customer_reminder",
            Self::DriverAssignment => "driver_assignment",
            Self::AdminBooking => "admin_booking",
            Self::AdminDriver => "admin_driver",
        }
    }

    /// All roles, in template-management display order.
    pub fn all() -> [RoleType; 5] {
        [
            Self::CustomerBooking,
            Self::CustomerReminder,
            Self::DriverAssignment,
            Self::AdminBooking,
            Self::AdminDriver,
        ]
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_booking" => Ok(Self::CustomerBooking),
            "customer_reminder" => Ok(Self::CustomerReminder),
            "driver_assignment" => Ok(Self::DriverAssignment),
            "admin_booking" => Ok(Self::AdminBooking),
            "admin_driver" => Ok(Self::AdminDriver),
            other => Err(NotifyError::Configuration(format!(
                "unknown template role `{other}`"
            ))),
        }
    }
}

/// Owner preference category consulted for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCategory {
    BookingConfirmations,
    StatusUpdates,
    PickupReminders,
}

/// A booking lifecycle event the engine can notify about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingEvent {
    /// Booking just came in. Operator alert only; the passenger never
    /// receives raw new-booking traffic.
    New,
    /// Booking confirmed by the operator.
    Confirmed,
    /// Booking cancelled (with or without charge).
    Cancelled,
    /// Any other status movement worth telling the customer about.
    StatusChanged { old_status: BookingStatus },
    /// Scheduled pickup reminder.
    Reminder,
}

impl BookingEvent {
    /// Stable string form used in audit records and template contexts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::StatusChanged { .. } => "status_change",
            Self::Reminder => "reminder",
        }
    }

    /// The owner preference category gating this event, if any.
    /// `New` has none: the owner is always told about their own booking.
    pub fn preference_category(&self) -> Option<PreferenceCategory> {
        match self {
            Self::New => None,
            Self::Confirmed => Some(PreferenceCategory::BookingConfirmations),
            Self::Cancelled | Self::StatusChanged { .. } => {
                Some(PreferenceCategory::StatusUpdates)
            }
            Self::Reminder => Some(PreferenceCategory::PickupReminders),
        }
    }

    /// Template role serving this event.
    pub fn role(&self) -> RoleType {
        match self {
            Self::New => RoleType::AdminBooking,
            Self::Confirmed | Self::Cancelled | Self::StatusChanged { .. } => {
                RoleType::CustomerBooking
            }
            Self::Reminder => RoleType::CustomerReminder,
        }
    }

    /// Previous status for status-change events.
    pub fn old_status(&self) -> Option<BookingStatus> {
        match self {
            Self::StatusChanged { old_status } => Some(*old_status),
            _ => None,
        }
    }

    /// Map a status transition to the event it should raise, or `None`
    /// when the transition is not notification-worthy (e.g. back to
    /// `Pending` during editing).
    pub fn for_status_change(old: BookingStatus, new: BookingStatus) -> Option<Self> {
        match new {
            BookingStatus::Confirmed => Some(Self::Confirmed),
            BookingStatus::Cancelled | BookingStatus::CancelledFullCharge => {
                Some(Self::Cancelled)
            }
            BookingStatus::TripCompleted
            | BookingStatus::CustomerNoShow
            | BookingStatus::TripNotCovered => Some(Self::StatusChanged { old_status: old }),
            BookingStatus::Pending => None,
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Driver-side events surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverEvent {
    /// Driver declined the assignment.
    Rejected,
    /// Driver marked the trip completed.
    Completed,
}

impl DriverEvent {
    /// Stable string form used in audit records and template contexts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected => "driver_rejection",
            Self::Completed => "driver_completion",
        }
    }
}

impl fmt::Display for DriverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in RoleType::all() {
            assert_eq!(role.as_str().parse::<RoleType>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_a_configuration_error() {
        let err = "customer_sms".parse::<RoleType>().unwrap_err();
        assert!(matches!(err, NotifyError::Configuration(_)));
    }

    #[test]
    fn events_map_to_expected_categories() {
        assert_eq!(BookingEvent::New.preference_category(), None);
        assert_eq!(
            BookingEvent::Confirmed.preference_category(),
            Some(PreferenceCategory::BookingConfirmations)
        );
        assert_eq!(
            BookingEvent::Cancelled.preference_category(),
            Some(PreferenceCategory::StatusUpdates)
        );
        assert_eq!(
            BookingEvent::StatusChanged {
                old_status: BookingStatus::Confirmed
            }
            .preference_category(),
            Some(PreferenceCategory::StatusUpdates)
        );
        assert_eq!(
            BookingEvent::Reminder.preference_category(),
            Some(PreferenceCategory::PickupReminders)
        );
    }

    #[test]
    fn events_map_to_expected_roles() {
        assert_eq!(BookingEvent::New.role(), RoleType::AdminBooking);
        assert_eq!(BookingEvent::Confirmed.role(), RoleType::CustomerBooking);
        assert_eq!(BookingEvent::Reminder.role(), RoleType::CustomerReminder);
    }

    #[test]
    fn status_transitions_raise_the_right_events() {
        assert_eq!(
            BookingEvent::for_status_change(BookingStatus::Pending, BookingStatus::Confirmed),
            Some(BookingEvent::Confirmed)
        );
        assert_eq!(
            BookingEvent::for_status_change(
                BookingStatus::Confirmed,
                BookingStatus::CancelledFullCharge
            ),
            Some(BookingEvent::Cancelled)
        );
        assert_eq!(
            BookingEvent::for_status_change(
                BookingStatus::Confirmed,
                BookingStatus::TripCompleted
            ),
            Some(BookingEvent::StatusChanged {
                old_status: BookingStatus::Confirmed
            })
        );
        assert_eq!(
            BookingEvent::for_status_change(BookingStatus::Confirmed, BookingStatus::Pending),
            None
        );
    }
}
