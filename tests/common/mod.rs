//! In-memory mailbox used by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use mailharvest::error::{HarvestError, Result};
use mailharvest::export::DownloadOptions;
use mailharvest::model::address::EmailAddress;
use mailharvest::model::attachment::{AttachmentKind, AttachmentRef};
use mailharvest::model::mail::{MessageId, MessageRef};
use mailharvest::provider::{Mailbox, MailboxSession};
use mailharvest::report::RunEvent;
use mailharvest::search::{MessageFilter, TimeBasis};
use mailharvest::CancelToken;

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// UTC day boundaries and no pacing, so tests are fast and deterministic.
pub fn test_options() -> DownloadOptions {
    DownloadOptions {
        time_basis: TimeBasis::Utc,
        pacing_delay: Duration::ZERO,
    }
}

pub fn drain(rx: &std::sync::mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
    rx.try_iter().collect()
}

#[derive(Clone)]
struct StoredMessage {
    meta: MessageRef,
    contents: Vec<Vec<u8>>,
}

/// A mailbox whose messages live in memory.
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    messages: Arc<Vec<StoredMessage>>,
    fail_connect: bool,
    fail_search: bool,
    skip_writes: bool,
    failing: HashSet<(u64, usize)>,
    cancel_after: Option<(usize, CancelToken)>,
    saves: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message. Attachments are `(file name, kind, contents)`.
    pub fn with_message(
        mut self,
        sender: &str,
        subject: &str,
        received_at: DateTime<Utc>,
        attachments: Vec<(&str, AttachmentKind, &str)>,
    ) -> Self {
        let id = MessageId(self.messages.len() as u64);
        let refs = attachments
            .iter()
            .enumerate()
            .map(|(index, (name, kind, _))| AttachmentRef::new(index, *name, *kind))
            .collect();
        let contents = attachments.iter().map(|(_, _, c)| c.as_bytes().to_vec()).collect();

        Arc::make_mut(&mut self.messages).push(StoredMessage {
            meta: MessageRef {
                id,
                sender: EmailAddress::parse(sender),
                subject: subject.to_string(),
                received_at,
                attachments: refs,
            },
            contents,
        });
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    /// Report every save as successful without writing a file.
    pub fn without_files(mut self) -> Self {
        self.skip_writes = true;
        self
    }

    /// Saving this attachment returns an error.
    pub fn failing_attachment(mut self, message: u64, index: usize) -> Self {
        self.failing.insert((message, index));
        self
    }

    /// Cancel `token` right after the `n`-th successful save.
    pub fn cancel_after(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Whether the last session has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Mailbox for MemoryMailbox {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        if self.fail_connect {
            return Err(HarvestError::Connection {
                mailbox: self.describe(),
                reason: "server unreachable".into(),
            });
        }
        self.released.store(false, Ordering::SeqCst);
        Ok(MemorySession {
            mailbox: self.clone(),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub struct MemorySession {
    mailbox: MemoryMailbox,
}

impl MailboxSession for MemorySession {
    fn search(&mut self, filter: &MessageFilter) -> Result<Vec<MessageRef>> {
        if self.mailbox.fail_search {
            return Err(HarvestError::Provider("search timed out".into()));
        }
        Ok(self
            .mailbox
            .messages
            .iter()
            .filter(|m| filter.matches(&m.meta.sender, m.meta.received_at))
            .map(|m| m.meta.clone())
            .collect())
    }

    fn save_attachment(
        &mut self,
        message: &MessageRef,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<()> {
        if self.mailbox.failing.contains(&(message.id.0, attachment.index)) {
            return Err(HarvestError::Provider("attachment blob missing".into()));
        }
        let contents = &self.mailbox.messages[message.id.0 as usize].contents[attachment.index];
        if self.mailbox.skip_writes {
            self.mailbox.saves.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .map_err(|e| HarvestError::io(dest, e))?;
        file.write_all(contents)
            .map_err(|e| HarvestError::io(dest, e))?;

        let saved = self.mailbox.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.mailbox.cancel_after {
            if saved == *n {
                token.cancel();
            }
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.mailbox.released.store(true, Ordering::SeqCst);
    }
}
