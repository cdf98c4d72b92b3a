//! Notification templates and the template store.
//!
//! Templates are operator-authored rows: a subject pattern and a body
//! pattern with `{{ variable }}` references and `{% if %}` blocks (see
//! [`render`](crate::render)). The store owns the one rule that matters for
//! delivery: lookup by role returns the active template or nothing, and
//! nothing means *do not send*. There is no fallback source behind it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::event::RoleType;

/// A named, versioned message template.
///
/// ```
/// use bellhop::{NotificationTemplate, RoleType};
///
/// let template = NotificationTemplate::new(RoleType::CustomerBooking, "Confirmation v2")
///     .subject("Booking {{ booking_reference }} {{ status }}")
///     .body("<p>Hi {{ passenger_name }}, your ride is {{ status }}.</p>")
///     .active(true);
///
/// assert!(template.active);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: Uuid,
    pub role: RoleType,
    /// Operator-facing version label, e.g. "Confirmation v2".
    pub name: String,
    /// Subject pattern.
    pub subject: String,
    /// Body pattern (HTML).
    pub body: String,
    pub active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationTemplate {
    /// Create an inactive template for a role.
    pub fn new(role: RoleType, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            name: name.into(),
            subject: String::new(),
            body: String::new(),
            active: false,
            activated_at: None,
            created_at: Utc::now(),
        }
    }

    /// Set the subject pattern.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the body pattern.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the active flag. Activation timestamps are stamped here so a
    /// template flagged active outside the store still sorts correctly.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        if active && self.activated_at.is_none() {
            self.activated_at = Some(Utc::now());
        }
        self
    }
}

/// Snapshot of a template's delivery statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TemplateStats {
    pub sent: u64,
    pub failed: u64,
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl TemplateStats {
    pub fn attempts(&self) -> u64 {
        self.sent + self.failed
    }

    /// Success percentage rounded to one decimal. An unused template
    /// reports 100.0 so dashboards do not flag templates that simply
    /// have not run yet.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            return 100.0;
        }
        (self.sent as f64 / attempts as f64 * 1000.0).round() / 10.0
    }
}

/// Trait for template storage backends.
///
/// Statistics methods are best-effort side effects: implementations must
/// swallow their own storage errors rather than let them reach the
/// delivery path.
pub trait TemplateStore: Send + Sync {
    /// The active template for a role, or `None`. Callers must treat
    /// `None` as "do not send" and never substitute fallback content.
    fn active(&self, role: RoleType) -> Option<NotificationTemplate>;

    /// Get a template by id.
    fn get(&self, id: Uuid) -> Option<NotificationTemplate>;

    /// Store a template, returning its id. Inserting an active template
    /// deactivates any other active template of the same role.
    fn insert(&self, template: NotificationTemplate) -> Uuid;

    /// Activate a template, deactivating any other active template of the
    /// same role. Returns false if the id is unknown.
    fn activate(&self, id: Uuid) -> bool;

    /// Deactivate a template. Returns false if the id is unknown.
    fn deactivate(&self, id: Uuid) -> bool;

    /// All templates, insertion order.
    fn all(&self) -> Vec<NotificationTemplate>;

    /// Count one successful send against the template.
    fn record_success(&self, id: Uuid);

    /// Count one failed render or send against the template.
    fn record_failure(&self, id: Uuid);

    /// Statistics snapshot for a known template id.
    fn stats(&self, id: Uuid) -> Option<TemplateStats>;
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    last_sent_at: RwLock<Option<DateTime<Utc>>>,
}

/// Thread-safe in-memory template store.
///
/// Counters are atomics, so concurrent `notify` passes cannot lose
/// increments; the template list itself sits behind a read-mostly lock.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<Vec<NotificationTemplate>>,
    counters: RwLock<HashMap<Uuid, Arc<Counters>>>,
}

impl MemoryTemplateStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn counter(&self, id: Uuid) -> Arc<Counters> {
        if let Some(counter) = self.counters.read().get(&id) {
            return Arc::clone(counter);
        }
        let mut counters = self.counters.write();
        Arc::clone(counters.entry(id).or_default())
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn active(&self, role: RoleType) -> Option<NotificationTemplate> {
        let templates = self.templates.read();

        // Most recently activated wins when more than one slipped into the
        // active state (e.g. a store populated out-of-band).
        templates
            .iter()
            .filter(|t| t.role == role && t.active)
            .max_by_key(|t| t.activated_at.unwrap_or(t.created_at))
            .cloned()
    }

    fn get(&self, id: Uuid) -> Option<NotificationTemplate> {
        self.templates.read().iter().find(|t| t.id == id).cloned()
    }

    fn insert(&self, template: NotificationTemplate) -> Uuid {
        let mut templates = self.templates.write();
        let id = template.id;

        if template.active {
            for existing in templates.iter_mut() {
                if existing.role == template.role {
                    existing.active = false;
                }
            }
        }

        let mut template = template;
        if template.active && template.activated_at.is_none() {
            template.activated_at = Some(Utc::now());
        }
        templates.push(template);
        drop(templates);

        // Seed a counter entry so stats() reports zeros immediately.
        let _ = self.counter(id);
        id
    }

    fn activate(&self, id: Uuid) -> bool {
        let mut templates = self.templates.write();
        let Some(role) = templates.iter().find(|t| t.id == id).map(|t| t.role) else {
            return false;
        };

        for template in templates.iter_mut() {
            if template.id == id {
                template.active = true;
                template.activated_at = Some(Utc::now());
            } else if template.role == role {
                template.active = false;
            }
        }
        true
    }

    fn deactivate(&self, id: Uuid) -> bool {
        let mut templates = self.templates.write();
        match templates.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                template.active = false;
                true
            }
            None => false,
        }
    }

    fn all(&self) -> Vec<NotificationTemplate> {
        self.templates.read().clone()
    }

    fn record_success(&self, id: Uuid) {
        let counter = self.counter(id);
        counter.sent.fetch_add(1, Ordering::Relaxed);
        *counter.last_sent_at.write() = Some(Utc::now());
    }

    fn record_failure(&self, id: Uuid) {
        let counter = self.counter(id);
        counter.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self, id: Uuid) -> Option<TemplateStats> {
        self.get(id)?;
        let counter = self.counter(id);
        let stats = TemplateStats {
            sent: counter.sent.load(Ordering::Relaxed),
            failed: counter.failed.load(Ordering::Relaxed),
            last_sent_at: *counter.last_sent_at.read(),
        };
        Some(stats)
    }
}

impl TemplateStore for Arc<MemoryTemplateStore> {
    fn active(&self, role: RoleType) -> Option<NotificationTemplate> {
        (**self).active(role)
    }

    fn get(&self, id: Uuid) -> Option<NotificationTemplate> {
        (**self).get(id)
    }

    fn insert(&self, template: NotificationTemplate) -> Uuid {
        (**self).insert(template)
    }

    fn activate(&self, id: Uuid) -> bool {
        (**self).activate(id)
    }

    fn deactivate(&self, id: Uuid) -> bool {
        (**self).deactivate(id)
    }

    fn all(&self) -> Vec<NotificationTemplate> {
        (**self).all()
    }

    fn record_success(&self, id: Uuid) {
        (**self).record_success(id)
    }

    fn record_failure(&self, id: Uuid) {
        (**self).record_failure(id)
    }

    fn stats(&self, id: Uuid) -> Option<TemplateStats> {
        (**self).stats(id)
    }
}
