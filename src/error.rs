//! Centralized error types for mailharvest.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a run, or that a single attachment save reports.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mailbox file or directory does not exist.
    #[error("Mailbox not found: {0}")]
    FileNotFound(PathBuf),

    /// The mailbox could not be opened or indexed.
    #[error("Could not open mailbox '{mailbox}': {reason}")]
    Connection { mailbox: String, reason: String },

    /// The provider failed while answering a search.
    #[error("Mailbox provider error: {0}")]
    Provider(String),

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// The requested attachment is not present in the message.
    #[error("Attachment #{index} not found in message {message}")]
    AttachmentNotFound { message: u64, index: usize },

    /// User input was rejected before the run started.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Input problems surfaced before any run starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a sender email address.")]
    MissingSender,

    #[error("Please select a download folder.")]
    MissingDestination,

    #[error("Please enter a valid email address (got '{0}').")]
    InvalidSender(String),
}

/// Convenience alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a failed open into `FileNotFound` or `Io`, depending on the error kind.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::io(path, source)
        }
    }
}
