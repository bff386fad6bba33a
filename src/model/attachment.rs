//! Attachment references handed out by a mailbox provider.
//!
//! Content is NOT held here. The provider decodes and writes it only when
//! the executor asks for a save.

/// How an attachment is carried by its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// A regular file stored with the message.
    ByValue,
    /// Inline content such as an image referenced from the HTML body.
    Inline,
    /// An attached message item (`message/rfc822`).
    EmbeddedMessage,
}

/// Metadata about one attachment of a message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AttachmentRef {
    /// Position among the message's attachments, as listed by the provider.
    pub index: usize,

    /// Filename as supplied by the message. Not sanitized.
    pub file_name: String,

    pub kind: AttachmentKind,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
}

impl AttachmentRef {
    pub fn new(index: usize, file_name: impl Into<String>, kind: AttachmentKind) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            kind,
            content_type: "application/octet-stream".to_string(),
        }
    }

    pub fn is_by_value(&self) -> bool {
        self.kind == AttachmentKind::ByValue
    }
}
