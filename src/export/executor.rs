//! The download run: search, count, then save every eligible attachment.
//!
//! ```text
//! Idle → Counting → Downloading → Completed
//!            ↓            ↓
//!        Cancelled    Cancelled          (any step) → Failed
//! ```
//!
//! Provider and destination-root errors end the run as `Failed`. Errors while
//! saving a single attachment are logged and the run moves on.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::error::{HarvestError, Result};
use crate::model::attachment::AttachmentRef;
use crate::model::criteria::DownloadRequest;
use crate::model::mail::MessageRef;
use crate::provider::{Mailbox, MailboxSession};
use crate::report::{Reporter, RunPhase};
use crate::search::{MessageFilter, TimeBasis};

use super::plan::{unique_path, DownloadPlan, PlannedMessage};
use super::sanitize::{format_file_size, sanitize_file_name};

/// Knobs that do not change what gets downloaded.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Where calendar days start, for date filters and folder names.
    pub time_basis: TimeBasis,
    /// Pause after each attachment. Zero disables it.
    pub pacing_delay: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            time_basis: TimeBasis::Local,
            pacing_delay: Duration::from_millis(10),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed { reason: String },
}

impl RunOutcome {
    pub fn phase(&self) -> RunPhase {
        match self {
            Self::Completed => RunPhase::Completed,
            Self::Cancelled => RunPhase::Cancelled,
            Self::Failed { .. } => RunPhase::Failed,
        }
    }
}

/// Counters of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunState {
    pub total_attachments: usize,
    pub downloaded_attachments: usize,
    pub failed_attachments: usize,
}

/// Everything a caller needs once the run is over.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    #[serde(flatten)]
    pub state: RunState,
    pub bytes_written: u64,
    /// Saved files in the order they were written.
    pub saved: Vec<PathBuf>,
}

impl RunSummary {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: RunOutcome::Failed {
                reason: reason.into(),
            },
            state: RunState::default(),
            bytes_written: 0,
            saved: Vec::new(),
        }
    }
}

/// Run one download to completion on the calling thread.
///
/// The mailbox session is opened here and dropped before returning, so the
/// provider is released whatever the outcome.
pub fn run_download<M: Mailbox>(
    mailbox: &M,
    request: &DownloadRequest,
    options: &DownloadOptions,
    cancel: &CancelToken,
    reporter: &mut Reporter,
) -> RunSummary {
    reporter.reset();

    let mut executor = Executor {
        request,
        options,
        cancel,
        reporter,
        state: RunState::default(),
        saved: Vec::new(),
        bytes_written: 0,
    };

    let outcome = match executor.execute(mailbox) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "Download failed");
            executor.reporter.append(format!("Error: {err}"));
            executor.reporter.set_status("Download failed");
            RunOutcome::Failed {
                reason: err.to_string(),
            }
        }
    };

    if outcome == RunOutcome::Cancelled {
        executor.reporter.append("Download cancelled by user.");
        executor.reporter.set_status("Download cancelled");
    }
    executor.reporter.set_phase(outcome.phase());

    info!(
        outcome = %outcome.phase(),
        downloaded = executor.state.downloaded_attachments,
        total = executor.state.total_attachments,
        failed = executor.state.failed_attachments,
        "Run finished"
    );

    RunSummary {
        outcome,
        state: executor.state,
        bytes_written: executor.bytes_written,
        saved: executor.saved,
    }
}

struct Executor<'a> {
    request: &'a DownloadRequest,
    options: &'a DownloadOptions,
    cancel: &'a CancelToken,
    reporter: &'a mut Reporter,
    state: RunState,
    saved: Vec<PathBuf>,
    bytes_written: u64,
}

impl Executor<'_> {
    fn execute<M: Mailbox>(&mut self, mailbox: &M) -> Result<RunOutcome> {
        let request = self.request;
        let criteria = &request.criteria;
        let destination = &request.destination;

        self.reporter.set_status("Connecting to mailbox...");
        self.reporter.append("Starting download process...");
        self.reporter.append(format!("Mailbox: {}", mailbox.describe()));
        self.reporter.append(format!("Sender: {}", criteria.sender));
        self.reporter.append(format!("Download folder: {}", destination.display()));
        self.reporter.append(format!("File types: {}", request.filter));
        if criteria.from_date.is_some() || criteria.to_date.is_some() {
            let show = |d: Option<chrono::NaiveDate>| {
                d.map_or_else(|| "Any".to_string(), |d| d.format("%Y-%m-%d").to_string())
            };
            self.reporter.append(format!(
                "Date range: {} to {}",
                show(criteria.from_date),
                show(criteria.to_date)
            ));
        }
        self.reporter.append("");

        let mut session = mailbox.connect()?;

        self.reporter.set_status("Searching for emails...");
        std::fs::create_dir_all(destination).map_err(|e| HarvestError::io(destination, e))?;

        let filter = MessageFilter::build(criteria, self.options.time_basis);
        let messages = session.search(&filter)?;
        self.reporter.append(format!(
            "Found {} emails from {}",
            messages.len(),
            criteria.sender
        ));

        if messages.is_empty() {
            self.reporter.append("No emails found matching the criteria.");
            self.reporter.set_status("No emails found");
            return Ok(RunOutcome::Completed);
        }

        self.reporter.set_phase(RunPhase::Counting);
        self.reporter.set_status("Counting attachments...");
        let Some(plan) = DownloadPlan::build(
            &messages,
            &request.filter,
            destination,
            self.options.time_basis,
            self.cancel,
        ) else {
            return Ok(RunOutcome::Cancelled);
        };

        self.state.total_attachments = plan.total_eligible;
        self.reporter.set_total(plan.total_eligible);
        self.reporter.append(format!(
            "Total attachments to download: {}",
            plan.total_eligible
        ));
        self.reporter.append("");

        if plan.is_empty() {
            self.reporter.append("No attachments found in the emails.");
            self.reporter.set_status("No attachments found");
            return Ok(RunOutcome::Completed);
        }

        self.reporter.set_phase(RunPhase::Downloading);
        self.reporter
            .set_status(format!("Downloading {} attachments...", plan.total_eligible));

        for planned in &plan.messages {
            if self.cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            let message = &messages[planned.message];
            if self.download_message(&mut session, message, planned).is_break() {
                return Ok(RunOutcome::Cancelled);
            }
        }

        let downloaded = self.state.downloaded_attachments;
        self.reporter.append("");
        self.reporter.append(format!(
            "Download completed! {downloaded} attachments saved to:"
        ));
        self.reporter.append(destination.display().to_string());
        self.reporter.set_status(format!(
            "Download completed - {downloaded} attachments downloaded"
        ));
        Ok(RunOutcome::Completed)
    }

    /// Save the eligible attachments of one message. `Break` means cancelled.
    fn download_message<S: MailboxSession>(
        &mut self,
        session: &mut S,
        message: &MessageRef,
        planned: &PlannedMessage,
    ) -> ControlFlow<()> {
        if let Err(e) = std::fs::create_dir_all(&planned.folder) {
            warn!(folder = %planned.folder.display(), error = %e, "Failed to create message folder");
            self.reporter.append(format!(
                "  ✗ Failed to create folder {}: {e}",
                planned.folder.display()
            ));
            self.state.failed_attachments += planned.eligible.len();
            return ControlFlow::Continue(());
        }

        self.reporter.append(format!(
            "Processing email: {} ({})",
            message.subject,
            self.options
                .time_basis
                .format(message.received_at, "%Y-%m-%d %H:%M")
        ));

        for &index in &planned.eligible {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            let Some(attachment) = message.attachments.iter().find(|a| a.index == index) else {
                continue;
            };

            match save_one(session, message, attachment, &planned.folder) {
                Ok((path, size)) => {
                    self.state.downloaded_attachments += 1;
                    self.reporter.record_download();
                    let shown = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let shown_size =
                        size.map_or_else(|| "size unknown".to_string(), format_file_size);
                    self.reporter
                        .append(format!("  ✓ Downloaded: {shown} ({shown_size})"));
                    self.bytes_written += size.unwrap_or(0);
                    self.saved.push(path);
                }
                Err(e) => {
                    self.state.failed_attachments += 1;
                    warn!(
                        filename = %attachment.file_name,
                        message = %message.id,
                        error = %e,
                        "Failed to save attachment"
                    );
                    self.reporter.append(format!(
                        "  ✗ Failed to download {}: {e}",
                        attachment.file_name
                    ));
                }
            }

            if !self.options.pacing_delay.is_zero() {
                std::thread::sleep(self.options.pacing_delay);
            }
        }

        ControlFlow::Continue(())
    }
}

/// Sanitize, deduplicate, save, and measure one attachment.
///
/// A saved file whose size cannot be read still counts as downloaded.
fn save_one<S: MailboxSession>(
    session: &mut S,
    message: &MessageRef,
    attachment: &AttachmentRef,
    folder: &Path,
) -> Result<(PathBuf, Option<u64>)> {
    let file_name = sanitize_file_name(&attachment.file_name);
    let path = unique_path(folder, &file_name);
    session.save_attachment(message, attachment, &path)?;
    let size = match std::fs::metadata(&path) {
        Ok(metadata) => Some(metadata.len()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Could not read saved file size");
            None
        }
    };
    Ok((path, size))
}
