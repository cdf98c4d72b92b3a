//! Mail transport implementations.
//!
//! Each transport implements the [`MailTransport`](crate::MailTransport) trait.
//!
//! ## Available Transports
//!
//! | Transport | Feature Flag | Description |
//! |-----------|-------------|-------------|
//! | [`SmtpTransport`] | `smtp` | SMTP via lettre |
//! | [`LocalTransport`] | (none) | In-memory capture for dev/testing |
//! | [`LoggerTransport`] | (none) | Logs emails without storing |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpTransport, TlsMode};

mod local;
pub use local::{CapturedEmail, LocalTransport};

mod logger;
pub use logger::LoggerTransport;
