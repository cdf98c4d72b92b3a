//! Recipient resolution: who receives a given booking event.
//!
//! Resolution is deterministic and runs in a fixed order: admin policy,
//! then the account holder's preference categories, then the passenger's
//! per-booking flags, then ad-hoc additional recipients, with
//! case-insensitive deduplication throughout. An operator's explicit
//! [`RecipientSelection`] replaces that pipeline entirely; it never blends
//! with preference-based resolution.
//!
//! [`RecipientResolver::preview`] runs the same rules without sending and
//! reports, per candidate, whether they would be included and why not,
//! so operator screens can show who a notification will reach before it
//! goes out.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

use crate::address::Address;
use crate::booking::{Booking, PreferenceSet};
use crate::error::NotifyError;
use crate::event::BookingEvent;

// ================================================================
// Admin policy
// ================================================================

/// One operator contact in the [`AdminPolicy::Directory`] variant.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminContact {
    pub name: String,
    pub email: Address,
    /// Departed or paused contacts stay in the directory but receive
    /// nothing.
    pub active: bool,
    /// Booking-event categories this contact wants. Events outside the
    /// categories (new-booking alerts, driver events) ignore these and
    /// reach every active contact.
    pub notifies: PreferenceSet,
}

impl AdminContact {
    pub fn new(name: impl Into<String>, email: impl Into<Address>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            active: true,
            notifies: PreferenceSet::default(),
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn notifies(mut self, notifies: PreferenceSet) -> Self {
        self.notifies = notifies;
        self
    }
}

/// How admin recipients are chosen, selected by event category rather
/// than per-event branching.
///
/// `Always` is the single-inbox default: one address copied on every
/// event. `Directory` routes booking events through per-contact category
/// preferences and broadcasts driver events (rejection, completion) to
/// every active contact; its `primary` inbox sits outside the preference
/// rules and hears every event, like `Always`.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminPolicy {
    Always(Address),
    Directory {
        /// Fixed inbox copied on every event, ahead of any contact.
        primary: Option<Address>,
        contacts: Vec<AdminContact>,
    },
}

impl AdminPolicy {
    /// Single-inbox policy from the `ADMIN_EMAIL` environment variable.
    pub fn from_env() -> Result<Self, NotifyError> {
        let email = env::var("ADMIN_EMAIL")
            .map_err(|_| NotifyError::Configuration("ADMIN_EMAIL not set".into()))?;
        Ok(Self::Always(Address::parse(&email)?))
    }

    /// Every admin address short of preference filtering: the fixed
    /// inbox plus every active contact. Used for driver events and for
    /// operator-forced sends.
    fn broadcast(&self) -> Vec<Address> {
        match self {
            Self::Always(address) => vec![address.clone()],
            Self::Directory { primary, contacts } => primary
                .iter()
                .cloned()
                .chain(contacts.iter().filter(|c| c.active).map(|c| c.email.clone()))
                .collect(),
        }
    }
}

// ================================================================
// Explicit selection
// ================================================================

/// Operator-chosen roles for a forced send ("send notification now").
///
/// When passed to [`RecipientResolver::resolve`], the selection replaces
/// preference-based resolution: selected roles are included even with
/// every preference disabled, unselected roles are left out, and
/// additional recipients are not consulted.
///
/// ```
/// use bellhop::resolve::RecipientSelection;
///
/// let selection = RecipientSelection::default().with_owner().with_passenger();
/// assert!(selection.owner && selection.passenger && !selection.admin);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSelection {
    pub admin: bool,
    pub owner: bool,
    pub passenger: bool,
}

impl RecipientSelection {
    /// Every role selected.
    pub fn all() -> Self {
        Self {
            admin: true,
            owner: true,
            passenger: true,
        }
    }

    pub fn with_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn with_owner(mut self) -> Self {
        self.owner = true;
        self
    }

    pub fn with_passenger(mut self) -> Self {
        self.passenger = true;
        self
    }

    /// A selection with no roles resolves to no recipients.
    pub fn is_empty(&self) -> bool {
        !self.admin && !self.owner && !self.passenger
    }
}

// ================================================================
// Resolution output
// ================================================================

/// Deduplicated recipient set in resolution order.
///
/// Order is stable (admins, owner, passenger, additional) and duplicates
/// compare case-insensitively, so the first spelling of an address wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedRecipients {
    entries: Vec<Address>,
}

impl ResolvedRecipients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address unless an equivalent one is already present.
    /// Returns whether the address was inserted.
    pub fn push(&mut self, address: Address) -> bool {
        if self.entries.iter().any(|a| a.matches(&address)) {
            return false;
        }
        self.entries.push(address);
        true
    }

    pub fn contains(&self, email: &str) -> bool {
        self.entries.iter().any(|a| a.email.eq_ignore_ascii_case(email))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.entries.iter()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.entries
    }
}

impl fmt::Display for ResolvedRecipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .entries
            .iter()
            .map(|a| a.email.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

impl IntoIterator for ResolvedRecipients {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<Address> for ResolvedRecipients {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut out = Self::new();
        for address in iter {
            out.push(address);
        }
        out
    }
}

// ================================================================
// Preview
// ================================================================

/// The role a candidate address plays in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Admin,
    Owner,
    Passenger,
    Additional,
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::Passenger => "passenger",
            Self::Additional => "additional",
        };
        f.write_str(label)
    }
}

/// Why a candidate was left out of the resolved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The relevant notification category is disabled.
    PreferenceDisabled,
    /// The booking has passenger notifications switched off.
    PassengerOptOut,
    /// No address on file for the role.
    NoAddress,
    /// An equivalent address is already in the set.
    Duplicate,
    /// The passenger address is the account holder's address. This rule
    /// is identity-based: it applies even when the owner themselves was
    /// skipped, so one person's opt-out is not undone by their second
    /// role on the booking.
    SameAsOwner,
    /// New-booking alerts are operator-facing only.
    NewBookingAlert,
    /// The entry does not look like an email address.
    InvalidAddress,
    /// The directory contact is inactive.
    Inactive,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PreferenceDisabled => "notification preference disabled",
            Self::PassengerOptOut => "passenger notifications disabled for this booking",
            Self::NoAddress => "no address on file",
            Self::Duplicate => "already receiving this notification",
            Self::SameAsOwner => "same address as the account holder",
            Self::NewBookingAlert => "new-booking alerts go to operators only",
            Self::InvalidAddress => "address failed validation",
            Self::Inactive => "contact is inactive",
        };
        f.write_str(text)
    }
}

/// One candidate's fate under default resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientDecision {
    pub role: RecipientRole,
    pub address: Option<Address>,
    pub included: bool,
    pub skipped: Option<SkipReason>,
}

impl RecipientDecision {
    fn included(role: RecipientRole, address: Address) -> Self {
        Self {
            role,
            address: Some(address),
            included: true,
            skipped: None,
        }
    }

    fn skipped(role: RecipientRole, address: Option<Address>, reason: SkipReason) -> Self {
        Self {
            role,
            address,
            included: false,
            skipped: Some(reason),
        }
    }
}

// ================================================================
// Resolver
// ================================================================

/// Applies the resolution rules for one configured admin policy.
#[derive(Debug, Clone)]
pub struct RecipientResolver {
    policy: AdminPolicy,
}

impl RecipientResolver {
    pub fn new(policy: AdminPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }

    /// Resolve recipients for a booking event.
    ///
    /// With `selection` present the operator's choice is final: selected
    /// roles are added when they have an address, nothing else is, and no
    /// preference or per-booking flag is consulted. Without it, resolution
    /// walks admin policy, owner preference, passenger flags, and
    /// additional recipients in that order.
    ///
    /// An empty result is a valid outcome, not an error.
    pub fn resolve(
        &self,
        booking: &Booking,
        event: &BookingEvent,
        selection: Option<&RecipientSelection>,
    ) -> ResolvedRecipients {
        if let Some(selection) = selection {
            return self.resolve_selected(booking, selection);
        }

        self.preview(booking, event)
            .into_iter()
            .filter_map(|decision| {
                if decision.included {
                    return decision.address;
                }
                if let Some(reason) = decision.skipped {
                    tracing::debug!(
                        role = %decision.role,
                        recipient = decision
                            .address
                            .as_ref()
                            .map_or("<none>", |a| a.email.as_str()),
                        reason = %reason,
                        "candidate excluded"
                    );
                }
                None
            })
            .collect()
    }

    /// Every active admin address, for admin-facing driver events.
    pub fn resolve_admins(&self) -> ResolvedRecipients {
        self.policy.broadcast().into_iter().collect()
    }

    /// Dry-run of default resolution, one decision per candidate.
    ///
    /// Included decisions are exactly the set [`resolve`](Self::resolve)
    /// returns without a selection, in the same order. Skipped decisions
    /// carry the first rule that excluded the candidate.
    pub fn preview(&self, booking: &Booking, event: &BookingEvent) -> Vec<RecipientDecision> {
        let mut set = ResolvedRecipients::new();
        let mut decisions = Vec::new();

        self.preview_admins(event, &mut set, &mut decisions);
        self.preview_owner(booking, event, &mut set, &mut decisions);
        self.preview_passenger(booking, event, &mut set, &mut decisions);
        self.preview_additional(booking, event, &mut set, &mut decisions);

        decisions
    }

    fn preview_admins(
        &self,
        event: &BookingEvent,
        set: &mut ResolvedRecipients,
        decisions: &mut Vec<RecipientDecision>,
    ) {
        match &self.policy {
            AdminPolicy::Always(address) => {
                set.push(address.clone());
                decisions.push(RecipientDecision::included(
                    RecipientRole::Admin,
                    address.clone(),
                ));
            }
            AdminPolicy::Directory { primary, contacts } => {
                if let Some(address) = primary {
                    set.push(address.clone());
                    decisions.push(RecipientDecision::included(
                        RecipientRole::Admin,
                        address.clone(),
                    ));
                }
                for contact in contacts {
                    let email = contact.email.clone();
                    if !contact.active {
                        decisions.push(RecipientDecision::skipped(
                            RecipientRole::Admin,
                            Some(email),
                            SkipReason::Inactive,
                        ));
                        continue;
                    }
                    let wanted = match event.preference_category() {
                        Some(category) => contact.notifies.allows(category),
                        None => true,
                    };
                    if !wanted {
                        decisions.push(RecipientDecision::skipped(
                            RecipientRole::Admin,
                            Some(email),
                            SkipReason::PreferenceDisabled,
                        ));
                    } else if set.push(email.clone()) {
                        decisions.push(RecipientDecision::included(RecipientRole::Admin, email));
                    } else {
                        decisions.push(RecipientDecision::skipped(
                            RecipientRole::Admin,
                            Some(email),
                            SkipReason::Duplicate,
                        ));
                    }
                }
            }
        }
    }

    fn preview_owner(
        &self,
        booking: &Booking,
        event: &BookingEvent,
        set: &mut ResolvedRecipients,
        decisions: &mut Vec<RecipientDecision>,
    ) {
        let owner = booking.owner_email.clone();

        // `new` maps to no category and always reaches the owner.
        let enabled = match event.preference_category() {
            Some(category) => booking.owner_notifies.allows(category),
            None => true,
        };

        if !enabled {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Owner,
                Some(owner),
                SkipReason::PreferenceDisabled,
            ));
        } else if set.push(owner.clone()) {
            decisions.push(RecipientDecision::included(RecipientRole::Owner, owner));
        } else {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Owner,
                Some(owner),
                SkipReason::Duplicate,
            ));
        }
    }

    fn preview_passenger(
        &self,
        booking: &Booking,
        event: &BookingEvent,
        set: &mut ResolvedRecipients,
        decisions: &mut Vec<RecipientDecision>,
    ) {
        let Some(passenger) = booking.passenger_email.clone() else {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Passenger,
                None,
                SkipReason::NoAddress,
            ));
            return;
        };

        if matches!(event, BookingEvent::New) {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Passenger,
                Some(passenger),
                SkipReason::NewBookingAlert,
            ));
        } else if !booking.send_passenger_notifications {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Passenger,
                Some(passenger),
                SkipReason::PassengerOptOut,
            ));
        } else if passenger.matches(&booking.owner_email) {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Passenger,
                Some(passenger),
                SkipReason::SameAsOwner,
            ));
        } else if !set.push(passenger.clone()) {
            decisions.push(RecipientDecision::skipped(
                RecipientRole::Passenger,
                Some(passenger),
                SkipReason::Duplicate,
            ));
        } else {
            decisions.push(RecipientDecision::included(
                RecipientRole::Passenger,
                passenger,
            ));
        }
    }

    fn preview_additional(
        &self,
        booking: &Booking,
        event: &BookingEvent,
        set: &mut ResolvedRecipients,
        decisions: &mut Vec<RecipientDecision>,
    ) {
        if booking.additional_recipients.is_empty() {
            return;
        }

        // Operator alerts never copy ad-hoc recipients.
        if matches!(event, BookingEvent::New) {
            for address in booking.additional_recipients.iter() {
                decisions.push(RecipientDecision::skipped(
                    RecipientRole::Additional,
                    Some(address.clone()),
                    SkipReason::NewBookingAlert,
                ));
            }
            return;
        }

        for address in booking.additional_recipients.iter() {
            let address = address.clone();
            // Entry validation happens where bookings are edited; this
            // re-check only guards against unvalidated rows.
            if !Address::plausible(&address.email) {
                tracing::debug!(
                    recipient = %address.email,
                    "dropping implausible additional recipient"
                );
                decisions.push(RecipientDecision::skipped(
                    RecipientRole::Additional,
                    Some(address),
                    SkipReason::InvalidAddress,
                ));
            } else if set.push(address.clone()) {
                decisions.push(RecipientDecision::included(
                    RecipientRole::Additional,
                    address,
                ));
            } else {
                decisions.push(RecipientDecision::skipped(
                    RecipientRole::Additional,
                    Some(address),
                    SkipReason::Duplicate,
                ));
            }
        }
    }

    /// Forced resolution from an operator selection. Preferences and
    /// per-booking flags are ignored; a selected role missing its address
    /// is simply absent from the result.
    fn resolve_selected(
        &self,
        booking: &Booking,
        selection: &RecipientSelection,
    ) -> ResolvedRecipients {
        let mut set = ResolvedRecipients::new();

        if selection.admin {
            for address in self.policy.broadcast() {
                set.push(address);
            }
        }
        if selection.owner {
            set.push(booking.owner_email.clone());
        }
        if selection.passenger {
            if let Some(passenger) = &booking.passenger_email {
                set.push(passenger.clone());
            }
        }

        set
    }
}
