//! Which attachments are worth downloading.

use crate::model::attachment::AttachmentRef;
use crate::model::criteria::FilterSpec;

/// `true` for by-value attachments whose extension passes `filter`.
///
/// Inline content and attached message items are never eligible. A name
/// without an extension only passes an empty (accept-all) filter.
pub fn is_eligible(attachment: &AttachmentRef, filter: &FilterSpec) -> bool {
    if !attachment.is_by_value() {
        return false;
    }
    if filter.accepts_all() {
        return true;
    }
    filter.contains(&extension_of(&attachment.file_name).to_lowercase())
}

/// Attachments of a message that [`is_eligible`] accepts, in message order.
pub fn eligible_attachments<'a>(
    attachments: &'a [AttachmentRef],
    filter: &'a FilterSpec,
) -> impl Iterator<Item = &'a AttachmentRef> + 'a {
    attachments.iter().filter(move |a| is_eligible(a, filter))
}

/// Extension of a file name, dot included: `"a.tar.gz"` → `".gz"`.
///
/// Returns `""` when there is no dot or the dot is the last character.
pub fn extension_of(file_name: &str) -> &str {
    split_extension(file_name).1
}

/// Split a file name into stem and extension (dot included).
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos + 1 < file_name.len() => file_name.split_at(pos),
        _ => (file_name, ""),
    }
}
