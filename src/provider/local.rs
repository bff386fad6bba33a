//! Mailbox provider over local files: an MBOX file, one `.eml` file, or a
//! directory of `.eml` files.

use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::{debug, info};

use crate::error::{HarvestError, Result};
use crate::model::attachment::AttachmentRef;
use crate::model::mail::{MessageId, MessageRef};
use crate::parser::header::{parse_envelope, Envelope};
use crate::parser::{eml, mbox::MboxScanner, mime};
use crate::search::MessageFilter;
use crate::store::{MessageLocation, MessageStore};

use super::{write_new_file, Mailbox, MailboxSession};

/// A mailbox stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalMailbox {
    path: PathBuf,
}

impl LocalMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index(&self) -> Result<LocalSession> {
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| HarvestError::open(&self.path, e))?;

        if metadata.is_dir() {
            let mut session = LocalSession::new(self.describe(), MessageStore::files());
            for file in eml::list_eml_files(&self.path)? {
                session.index_file(file)?;
            }
            return Ok(session);
        }

        if eml::is_eml(&self.path) {
            let mut session = LocalSession::new(self.describe(), MessageStore::files());
            session.index_file(self.path.clone())?;
            return Ok(session);
        }

        let mut session = LocalSession::new(self.describe(), MessageStore::open_mbox(&self.path)?);
        MboxScanner::new(&self.path).scan(&mut |span, headers| {
            session.index.push(IndexedMessage {
                location: MessageLocation::Mbox {
                    offset: span.offset,
                    length: span.length,
                },
                envelope: parse_envelope(headers),
            });
            true
        })?;
        Ok(session)
    }
}

impl Mailbox for LocalMailbox {
    type Session = LocalSession;

    fn connect(&self) -> Result<LocalSession> {
        let session = self.index().map_err(|e| HarvestError::Connection {
            mailbox: self.describe(),
            reason: e.to_string(),
        })?;
        info!(
            mailbox = %self.path.display(),
            messages = session.index.len(),
            "Indexed mailbox"
        );
        Ok(session)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct IndexedMessage {
    location: MessageLocation,
    envelope: Envelope,
}

/// An indexed local mailbox. Holds the MBOX file open until dropped.
pub struct LocalSession {
    label: String,
    store: MessageStore,
    index: Vec<IndexedMessage>,
}

impl LocalSession {
    fn new(label: String, store: MessageStore) -> Self {
        Self {
            label,
            store,
            index: Vec::new(),
        }
    }

    fn index_file(&mut self, path: PathBuf) -> Result<()> {
        let data = std::fs::read(&path).map_err(|e| HarvestError::open(&path, e))?;
        self.index.push(IndexedMessage {
            envelope: parse_envelope(eml::header_block(&data)),
            location: MessageLocation::File(path),
        });
        Ok(())
    }

    /// Number of messages found while indexing.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl MailboxSession for LocalSession {
    fn search(&mut self, filter: &MessageFilter) -> Result<Vec<MessageRef>> {
        let mut found = Vec::new();

        for (seq, entry) in self.index.iter().enumerate() {
            let received_at = entry.envelope.date.unwrap_or(DateTime::UNIX_EPOCH);
            if !filter.matches(&entry.envelope.from, received_at) {
                continue;
            }

            let id = MessageId(seq as u64);
            let raw = self.store.raw(id, &entry.location)?;
            found.push(MessageRef {
                id,
                sender: entry.envelope.from.clone(),
                subject: entry.envelope.subject.clone(),
                received_at,
                attachments: mime::list_attachments(raw),
            });
        }

        debug!(mailbox = %self.label, %filter, matched = found.len(), "Search finished");
        Ok(found)
    }

    fn save_attachment(
        &mut self,
        message: &MessageRef,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<()> {
        let entry = self
            .index
            .get(message.id.0 as usize)
            .ok_or(HarvestError::AttachmentNotFound {
                message: message.id.0,
                index: attachment.index,
            })?;

        let raw = self.store.raw(message.id, &entry.location)?;
        let contents = mime::attachment_contents(raw, attachment.index)?;
        write_new_file(dest, &contents)
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        debug!(mailbox = %self.label, "Closing mailbox session");
    }
}
