//! Download planning: which attachments to fetch and where each message's files go.

use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::model::criteria::FilterSpec;
use crate::model::mail::MessageRef;
use crate::search::TimeBasis;

use super::classify::{eligible_attachments, split_extension};
use super::sanitize::sanitize_file_name;

/// Characters of the sanitized subject kept in a folder name.
pub const FOLDER_SUBJECT_CHARS: usize = 50;

/// One message that has something to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMessage {
    /// Position in the search result.
    pub message: usize,
    /// Folder the message's attachments are written to.
    pub folder: PathBuf,
    /// `AttachmentRef::index` of every eligible attachment, in message order.
    pub eligible: Vec<usize>,
}

/// Result of the counting pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    pub total_eligible: usize,
    /// Only messages with at least one eligible attachment, in search order.
    pub messages: Vec<PlannedMessage>,
}

impl DownloadPlan {
    /// Count eligible attachments message by message.
    ///
    /// Cancellation is checked before each message; `None` means the count
    /// was abandoned.
    pub fn build(
        messages: &[MessageRef],
        filter: &FilterSpec,
        root: &Path,
        basis: TimeBasis,
        cancel: &CancelToken,
    ) -> Option<Self> {
        let mut plan = Self::default();

        for (position, message) in messages.iter().enumerate() {
            if cancel.is_cancelled() {
                return None;
            }

            let eligible: Vec<usize> = eligible_attachments(&message.attachments, filter)
                .map(|a| a.index)
                .collect();
            if eligible.is_empty() {
                continue;
            }

            plan.total_eligible += eligible.len();
            plan.messages.push(PlannedMessage {
                message: position,
                folder: root.join(message_folder_name(message, basis)),
                eligible,
            });
        }

        Some(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.total_eligible == 0
    }
}

/// `{YYYY-MM-DD}_{subject}`, the subject sanitized and cut to
/// [`FOLDER_SUBJECT_CHARS`] characters.
pub fn message_folder_name(message: &MessageRef, basis: TimeBasis) -> String {
    let date = basis.format(message.received_at, "%Y-%m-%d");
    let subject: String = sanitize_file_name(&message.subject)
        .chars()
        .take(FOLDER_SUBJECT_CHARS)
        .collect();
    format!("{date}_{subject}")
}

/// First free path for `file_name` in `folder`: `name.ext`, then
/// `name_1.ext`, `name_2.ext`, …
pub fn unique_path(folder: &Path, file_name: &str) -> PathBuf {
    let candidate = folder.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(file_name);
    let mut counter = 1u64;
    loop {
        let candidate = folder.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
