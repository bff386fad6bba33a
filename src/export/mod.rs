//! Attachment export: file naming, eligibility, planning, and the download run.

pub mod classify;
pub mod executor;
pub mod plan;
pub mod sanitize;

pub use executor::{run_download, DownloadOptions, RunOutcome, RunState, RunSummary};
