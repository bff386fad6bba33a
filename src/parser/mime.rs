//! MIME structure: listing attachments and decoding one of them.

use std::collections::HashSet;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{HarvestError, Result};
use crate::model::attachment::{AttachmentKind, AttachmentRef};

/// List the attachments of a raw message without keeping their content.
///
/// Unparseable messages have no attachments.
pub fn list_attachments(raw_message: &[u8]) -> Vec<AttachmentRef> {
    let message_bytes = skip_from_line(raw_message);
    let Some(msg) = MessageParser::default().parse(message_bytes) else {
        return Vec::new();
    };
    let related = related_parts(&msg);

    msg.attachments
        .iter()
        .enumerate()
        .filter_map(|(index, &id)| {
            let id = usize::try_from(id).ok()?;
            msg.parts.get(id).map(|part| (index, id, part))
        })
        .map(|(index, id, part)| {
            let file_name = part
                .attachment_name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("attachment_{index}"));

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());

            AttachmentRef {
                index,
                file_name,
                kind: classify_part(part, related.contains(&id)),
                content_type,
            }
        })
        .collect()
}

/// Decoded content of the attachment at `index` (as numbered by [`list_attachments`]).
pub fn attachment_contents(raw_message: &[u8], index: usize) -> Result<Vec<u8>> {
    let message_bytes = skip_from_line(raw_message);
    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| HarvestError::MimeError("Failed to parse message".into()))?;

    msg.attachments()
        .nth(index)
        .map(|part| part.contents().to_vec())
        .ok_or_else(|| HarvestError::MimeError(format!("No attachment at position {index}")))
}

/// Attached messages and content the body references are not files in their
/// own right. An inline disposition alone does not make a part embedded.
fn classify_part(part: &MessagePart<'_>, in_related: bool) -> AttachmentKind {
    if matches!(part.body, PartType::Message(_)) {
        return AttachmentKind::EmbeddedMessage;
    }

    let explicit_attachment = part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"));
    if explicit_attachment {
        return AttachmentKind::ByValue;
    }

    let image = part
        .content_type()
        .is_some_and(|ct| ct.ctype().eq_ignore_ascii_case("image"));

    if part.content_id().is_some() || (image && in_related) {
        AttachmentKind::Inline
    } else {
        AttachmentKind::ByValue
    }
}

/// Ids of the direct children of every `multipart/related` part.
fn related_parts(msg: &Message<'_>) -> HashSet<usize> {
    msg.parts
        .iter()
        .filter(|part| {
            part.content_type().is_some_and(|ct| {
                ct.ctype().eq_ignore_ascii_case("multipart")
                    && ct.subtype().is_some_and(|sub| sub.eq_ignore_ascii_case("related"))
            })
        })
        .filter_map(|part| match &part.body {
            PartType::Multipart(children) => Some(children),
            _ => None,
        })
        .flatten()
        .filter_map(|&child| usize::try_from(child).ok())
        .collect()
}

/// Skip the `From ` separator line at the start of MBOX messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
