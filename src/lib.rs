//! `mailharvest`: bulk download of email attachments from one sender.
//!
//! The library validates a job, builds a mailbox filter, counts eligible
//! attachments, and saves them under per-message folders while reporting
//! progress and honoring cancellation. Presentation layers (the bundled CLI
//! or anything else) consume [`report::RunEvent`]s and hold a
//! [`cancel::CancelToken`].

pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod provider;
pub mod report;
pub mod run;
pub mod search;
pub mod store;

pub use cancel::CancelToken;
pub use error::{HarvestError, Result, ValidationError};
pub use export::{run_download, DownloadOptions, RunOutcome, RunSummary};
pub use model::criteria::{DownloadRequest, JobInput};
pub use run::{spawn_download, RunHandle};
