//! Messages returned by a mailbox search.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::AttachmentRef;

/// Provider-assigned identifier, stable for the lifetime of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A message matched by a search.
///
/// Owned by the provider session for one run; the pipeline only reads it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageRef {
    pub id: MessageId,

    /// Sender (first `From:` address).
    pub sender: EmailAddress,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// Parsed `Date:` header, falling back to the MBOX separator date,
    /// then to the Unix epoch.
    pub received_at: DateTime<Utc>,

    /// Attachments in the order the message lists them.
    pub attachments: Vec<AttachmentRef>,
}
