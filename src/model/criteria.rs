//! User input for a run: who to search for, when, where to write, and which file types.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Which messages to look for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SearchCriteria {
    /// Matched exactly against the sender address or display name.
    pub sender: String,
    /// First calendar day to include.
    pub from_date: Option<NaiveDate>,
    /// Last calendar day to include (the whole day counts).
    pub to_date: Option<NaiveDate>,
}

impl SearchCriteria {
    /// `true` when both bounds are set and the range contains no day at all.
    pub fn is_inverted(&self) -> bool {
        matches!((self.from_date, self.to_date), (Some(from), Some(to)) if from > to)
    }
}

/// Allowed attachment extensions. Empty accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilterSpec {
    /// Lowercase, dot-prefixed extensions (`".pdf"`).
    pub allowed_extensions: BTreeSet<String>,
}

impl FilterSpec {
    /// Build from comma-separated user input such as `".pdf, DOCX,xlsx"`.
    ///
    /// Entries are trimmed and lower-cased, empty entries are dropped, and a
    /// missing leading dot is added.
    pub fn parse_csv(raw: &str) -> Self {
        let allowed_extensions = raw
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
            .collect();
        Self { allowed_extensions }
    }

    pub fn accepts_all(&self) -> bool {
        self.allowed_extensions.is_empty()
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }
}

impl std::fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.accepts_all() {
            return write!(f, "all file types");
        }
        let list: Vec<&str> = self.allowed_extensions.iter().map(String::as_str).collect();
        write!(f, "{}", list.join(", "))
    }
}

/// Raw input as collected by a presentation layer.
#[derive(Debug, Clone, Default)]
pub struct JobInput {
    pub sender: String,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub destination: Option<PathBuf>,
    pub allowed_extensions_csv: String,
}

/// Input that passed validation; the only thing a run accepts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DownloadRequest {
    pub criteria: SearchCriteria,
    pub destination: PathBuf,
    pub filter: FilterSpec,
}

impl JobInput {
    /// Check the input in the order a user would fix it: sender, folder, then
    /// the sender's syntax.
    pub fn validate(self) -> Result<DownloadRequest, ValidationError> {
        let sender = self.sender.trim();
        if sender.is_empty() {
            return Err(ValidationError::MissingSender);
        }

        let destination = match self.destination {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err(ValidationError::MissingDestination),
        };

        // A bare address only: display-name forms never match a sender.
        let bare = sender
            .parse::<email_address::EmailAddress>()
            .is_ok_and(|address| address.email() == sender);
        if !bare {
            return Err(ValidationError::InvalidSender(sender.to_string()));
        }

        Ok(DownloadRequest {
            criteria: SearchCriteria {
                sender: sender.to_string(),
                from_date: self.from_date,
                to_date: self.to_date,
            },
            destination,
            filter: FilterSpec::parse_csv(&self.allowed_extensions_csv),
        })
    }
}
