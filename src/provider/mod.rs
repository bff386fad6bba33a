//! Mailbox providers: where messages come from and how attachments get saved.
//!
//! A [`Mailbox`] describes a source; [`Mailbox::connect`] opens a
//! [`MailboxSession`] that lives for exactly one run. Any handles the session
//! holds are released when it is dropped, whichever way the run ends.

pub mod local;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{HarvestError, Result};
use crate::model::attachment::AttachmentRef;
use crate::model::mail::MessageRef;
use crate::search::MessageFilter;

pub use local::LocalMailbox;

/// A source of messages.
pub trait Mailbox {
    type Session: MailboxSession;

    /// Open a session. Failure here is fatal to the run.
    fn connect(&self) -> Result<Self::Session>;

    /// Short description for logs, e.g. the mailbox path.
    fn describe(&self) -> String;
}

/// An open mailbox, valid for one run.
pub trait MailboxSession {
    /// Messages matching `filter`, in mailbox order.
    fn search(&mut self, filter: &MessageFilter) -> Result<Vec<MessageRef>>;

    /// Decode one attachment and write it to `dest`.
    ///
    /// `dest` does not exist yet; errors here only affect this attachment.
    fn save_attachment(
        &mut self,
        message: &MessageRef,
        attachment: &AttachmentRef,
        dest: &Path,
    ) -> Result<()>;
}

/// Write `contents` to `dest`, which must not exist yet.
///
/// A failed write removes the partial file, so a retry reuses the name.
pub fn write_new_file(dest: &Path, contents: &[u8]) -> Result<()> {
    write_new_file_with(dest, |file| file.write_all(contents))
}

fn write_new_file_with(
    dest: &Path,
    write: impl FnOnce(&mut File) -> std::io::Result<()>,
) -> Result<()> {
    // create_new: an existing file is never overwritten.
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| HarvestError::io(dest, e))?;

    if let Err(e) = write(&mut file).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove) = std::fs::remove_file(dest) {
            tracing::warn!(path = %dest.display(), error = %remove, "Failed to remove partial file");
        }
        return Err(HarvestError::io(dest, e));
    }
    Ok(())
}
