//! Delivery audit trail.
//!
//! Every delivery attempt leaves one [`AuditRecord`], written after the
//! attempt and never mutated. The log is append-only; operators read it
//! through [`AuditQuery`] filters or the per-booking
//! [`NotificationHistory`] rollup.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One attempted delivery: who, for what, when, and how it went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub booking_reference: String,
    pub recipient: String,
    /// Event kind, e.g. `confirmed` or `driver_rejection`.
    pub event: String,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn success(
        booking_reference: impl Into<String>,
        recipient: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_reference: booking_reference.into(),
            recipient: recipient.into(),
            event: event.into(),
            sent_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn failure(
        booking_reference: impl Into<String>,
        recipient: impl Into<String>,
        event: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_reference: booking_reference.into(),
            recipient: recipient.into(),
            event: event.into(),
            sent_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Filter and ordering for reading the log. All filters are optional and
/// conjunctive; results come newest first unless
/// [`oldest_first`](Self::oldest_first) is set.
///
/// ```
/// use bellhop::audit::AuditQuery;
///
/// let query = AuditQuery::new()
///     .booking("BK-1042")
///     .event("confirmed")
///     .limit(20);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    booking: Option<String>,
    event: Option<String>,
    recipient: Option<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    oldest_first: bool,
    limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booking(mut self, reference: impl Into<String>) -> Self {
        self.booking = Some(reference.into());
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Matches recipients case-insensitively.
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Keep records sent at or after this instant.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Keep records sent at or before this instant.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    /// Cap the result count, applied after ordering.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(booking) = &self.booking {
            if record.booking_reference != *booking {
                return false;
            }
        }
        if let Some(event) = &self.event {
            if record.event != *event {
                return false;
            }
        }
        if let Some(recipient) = &self.recipient {
            if !record.recipient.eq_ignore_ascii_case(recipient) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.sent_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.sent_at > until {
                return false;
            }
        }
        true
    }
}

/// Per-booking delivery rollup for operator screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationHistory {
    pub booking_reference: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The most recent attempts, newest first, capped at ten.
    pub latest: Vec<AuditRecord>,
}

/// Number of records [`NotificationHistory::latest`] retains.
const HISTORY_LATEST: usize = 10;

/// Where audit records are written and read back.
///
/// Writes are best-effort from the orchestrator's point of view: a
/// failing log must never block a delivery attempt, so `record` is
/// infallible by contract.
pub trait AuditLog: Send + Sync {
    /// Append one record. Records are never updated or removed.
    fn record(&self, record: AuditRecord);

    /// Read records matching the query, in its requested order.
    fn query(&self, query: &AuditQuery) -> Vec<AuditRecord>;

    /// Total records written.
    fn count(&self) -> usize;

    /// Rollup of everything attempted for one booking.
    fn history(&self, booking_reference: &str) -> NotificationHistory {
        let records = self.query(&AuditQuery::new().booking(booking_reference));
        let succeeded = records.iter().filter(|r| r.success).count();
        NotificationHistory {
            booking_reference: booking_reference.to_owned(),
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            latest: records.into_iter().take(HISTORY_LATEST).collect(),
        }
    }
}

/// In-memory audit log. The default for tests and single-process
/// deployments; swap in a database-backed implementation by implementing
/// [`AuditLog`] over your store.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A shareable handle, ready to hand to a notifier.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Drop all records. Test convenience; production logs are retained
    /// indefinitely.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, record: AuditRecord) {
        self.records.write().push(record);
    }

    fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let records = self.records.read();
        let mut hits: Vec<AuditRecord> = records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        // Stable ascending sort, then reverse: identical timestamps come
        // out in insertion order when oldest-first and latest-written
        // first when newest-first
        hits.sort_by_key(|r| r.sent_at);
        if !query.oldest_first {
            hits.reverse();
        }

        match query.limit {
            Some(limit) => hits.into_iter().take(limit).collect(),
            None => hits,
        }
    }

    fn count(&self) -> usize {
        self.records.read().len()
    }
}

impl AuditLog for Arc<MemoryAuditLog> {
    fn record(&self, record: AuditRecord) {
        self.as_ref().record(record);
    }

    fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        self.as_ref().query(query)
    }

    fn count(&self) -> usize {
        self.as_ref().count()
    }
}
