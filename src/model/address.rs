//! Sender identity of a message.

/// A sender as it appears in the `From:` header.
///
/// - `"Alice Doe <alice@example.com>"` → `display_name = "Alice Doe"`, `address = "alice@example.com"`
/// - `"alice@example.com"` → `display_name = ""`, `address = "alice@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a raw header value without any RFC 2047 decoding.
    ///
    /// Used when the MIME parser could not make sense of the `From:` header.
    /// Anything that is not `Name <addr>` is stored as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self::new(
                    strip_quotes(&trimmed[..open]),
                    trimmed[open + 1..close].trim(),
                );
            }
        }

        Self::new("", trimmed)
    }

    /// `true` if the identifier equals either the address or the display name.
    pub fn is_identified_by(&self, identifier: &str) -> bool {
        self.address == identifier || self.display_name == identifier
    }
}

fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}
