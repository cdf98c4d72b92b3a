//! Email address types: single addresses and the validated recipient list
//! used for a booking's ad-hoc additional recipients.

use crate::error::NotifyError;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An email address with an optional display name.
///
/// # Examples
///
/// ```
/// use bellhop::Address;
///
/// // From email string
/// let addr: Address = "user@example.com".into();
/// assert_eq!(addr.email, "user@example.com");
/// assert_eq!(addr.name, None);
///
/// // From tuple (name, email)
/// let addr: Address = ("Alice", "alice@example.com").into();
/// assert_eq!(addr.email, "alice@example.com");
/// assert_eq!(addr.name, Some("Alice".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name (e.g., "Alice Smith")
    pub name: Option<String>,
    /// Email address (e.g., "alice@example.com")
    pub email: String,
}

impl Address {
    /// Create a new address with just an email.
    ///
    /// This performs a basic plausibility check (non-empty, local part and
    /// domain around an `@`) and logs a warning if the email looks invalid.
    /// For strict validation, use [`Address::parse`] instead.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();

        if !Self::plausible(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }

        Self { name: None, email }
    }

    /// Create a new address with a name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();

        if !Self::plausible(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with potentially invalid email. Use Address::parse() for strict validation."
            );
        }

        Self {
            name: Some(name.into()),
            email,
        }
    }

    /// Plausibility check: non-empty local part, an `@`, and a domain
    /// segment with at least one dot. NOT full validation; use
    /// [`Address::parse`] for that. This is the rule used when re-checking
    /// free-text additional recipients at resolution time.
    pub fn plausible(email: &str) -> bool {
        match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && domain.contains('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse and validate an email address.
    ///
    /// Uses RFC 5321/5322 compliant validation. Returns an error if the
    /// email address is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use bellhop::Address;
    ///
    /// let addr = Address::parse("user@example.com").unwrap();
    /// assert_eq!(addr.email, "user@example.com");
    ///
    /// assert!(Address::parse("not-an-email").is_err());
    /// assert!(Address::parse("").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, NotifyError> {
        if !EmailAddress::is_valid(email) {
            return Err(NotifyError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        Ok(Self {
            name: None,
            email: email.to_string(),
        })
    }

    /// Parse and validate an email address with a display name.
    pub fn parse_with_name(name: &str, email: &str) -> Result<Self, NotifyError> {
        let mut addr = Self::parse(email)?;
        if !name.is_empty() {
            addr.name = Some(name.to_string());
        }
        Ok(addr)
    }

    /// Lowercased form of the email, the key for case-insensitive
    /// deduplication across a resolved recipient set.
    pub fn normalized(&self) -> String {
        self.email.to_lowercase()
    }

    /// Case-insensitive address equality (display names ignored).
    pub fn matches(&self, other: &Address) -> bool {
        self.email.eq_ignore_ascii_case(&other.email)
    }

    /// Format for display: `Name <email>` or just `email`.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl From<&String> for Address {
    fn from(email: &String) -> Self {
        Self::new(email.clone())
    }
}

impl From<(&str, &str)> for Address {
    fn from((name, email): (&str, &str)) -> Self {
        Self::with_name(name, email)
    }
}

impl From<(String, String)> for Address {
    fn from((name, email): (String, String)) -> Self {
        Self::with_name(name, email)
    }
}

impl From<&Address> for Address {
    fn from(addr: &Address) -> Self {
        addr.clone()
    }
}

/// A validated, ordered, case-insensitively deduplicated list of addresses.
///
/// This is the boundary type for a booking's free-text additional
/// recipients. [`RecipientList::parse`] is the strict data-entry gate;
/// [`RecipientList::from_raw`] is the lenient resolution-time fallback that
/// drops implausible entries instead of failing.
///
/// # Examples
///
/// ```
/// use bellhop::RecipientList;
///
/// let list = RecipientList::parse("a@x.com, b@y.com").unwrap();
/// assert_eq!(list.len(), 2);
///
/// // Strict parse rejects any bad entry
/// assert!(RecipientList::parse("a@x.com, not-an-email").is_err());
///
/// // Lenient form drops it instead
/// let list = RecipientList::from_raw("a@x.com, not-an-email");
/// assert_eq!(list.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientList {
    entries: Vec<Address>,
}

impl RecipientList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly parse a comma-separated list. Every entry must be a valid
    /// email address; blank segments are ignored.
    pub fn parse(raw: &str) -> Result<Self, NotifyError> {
        let mut list = Self::new();
        for entry in Self::segments(raw) {
            list.push(Address::parse(entry)?);
        }
        Ok(list)
    }

    /// Leniently parse a comma-separated list, silently dropping entries
    /// that fail the plausibility check. Used as defense in depth when a
    /// booking carries raw text that skipped the strict gate.
    pub fn from_raw(raw: &str) -> Self {
        let mut list = Self::new();
        for entry in Self::segments(raw) {
            if Address::plausible(entry) {
                list.push(Address::new(entry));
            } else {
                tracing::warn!(entry = %entry, "Dropping implausible additional recipient");
            }
        }
        list
    }

    fn segments(raw: &str) -> impl Iterator<Item = &str> {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    /// Append an address unless it is already present (case-insensitive).
    pub fn push(&mut self, addr: Address) {
        if !self.entries.iter().any(|a| a.matches(&addr)) {
            self.entries.push(addr);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.entries.iter()
    }
}

impl fmt::Display for RecipientList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .entries
            .iter()
            .map(|a| a.email.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl FromIterator<Address> for RecipientList {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        let mut list = Self::new();
        for addr in iter {
            list.push(addr);
        }
        list
    }
}
