//! Query builder: turns [`SearchCriteria`] into a [`MessageFilter`].
//!
//! # Semantics
//!
//! - sender: address **or** display name equals the identifier, byte for byte
//! - `from_date`: received at or after that day's midnight
//! - `to_date`: received strictly before the *next* day's midnight, so the
//!   whole `to_date` day is included
//! - no date given: no date restriction on that side
//!
//! Midnights are taken in the configured [`TimeBasis`].

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::model::address::EmailAddress;
use crate::model::criteria::SearchCriteria;

/// Which clock decides where a calendar day starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBasis {
    /// The machine's local time zone.
    #[default]
    Local,
    Utc,
}

impl TimeBasis {
    /// Instant at which `day` begins.
    pub fn start_of_day(self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        match self {
            TimeBasis::Utc => Utc.from_utc_datetime(&midnight),
            TimeBasis::Local => {
                let local = Local.from_local_datetime(&midnight);
                // A DST gap can swallow midnight; fall back to the UTC reading.
                local
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
            }
        }
    }

    /// Calendar day on which `instant` falls.
    pub fn date_of(self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            TimeBasis::Utc => instant.date_naive(),
            TimeBasis::Local => instant.with_timezone(&Local).date_naive(),
        }
    }

    /// Format `instant` with a `strftime` pattern in this basis.
    pub fn format(self, instant: DateTime<Utc>, pattern: &str) -> String {
        match self {
            TimeBasis::Utc => instant.format(pattern).to_string(),
            TimeBasis::Local => instant.with_timezone(&Local).format(pattern).to_string(),
        }
    }
}

/// Provider-facing filter built from user criteria.
///
/// Providers evaluate it through [`MessageFilter::matches`]; they never need
/// to know how the bounds were derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    sender: String,
    received_from: Option<DateTime<Utc>>,
    received_before: Option<DateTime<Utc>>,
}

impl MessageFilter {
    pub fn build(criteria: &SearchCriteria, basis: TimeBasis) -> Self {
        if criteria.is_inverted() {
            tracing::warn!(
                from = ?criteria.from_date,
                to = ?criteria.to_date,
                "Date range ends before it starts; no message can match"
            );
        }

        let received_from = criteria.from_date.map(|day| basis.start_of_day(day));
        let received_before = criteria.to_date.map(|day| {
            let next = day.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);
            basis.start_of_day(next)
        });

        Self {
            sender: criteria.sender.clone(),
            received_from,
            received_before,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Inclusive lower bound on the received time.
    pub fn received_from(&self) -> Option<DateTime<Utc>> {
        self.received_from
    }

    /// Exclusive upper bound on the received time.
    pub fn received_before(&self) -> Option<DateTime<Utc>> {
        self.received_before
    }

    pub fn matches_sender(&self, sender: &EmailAddress) -> bool {
        sender.is_identified_by(&self.sender)
    }

    pub fn matches_received(&self, received_at: DateTime<Utc>) -> bool {
        self.received_from.is_none_or(|from| received_at >= from)
            && self.received_before.is_none_or(|before| received_at < before)
    }

    pub fn matches(&self, sender: &EmailAddress, received_at: DateTime<Utc>) -> bool {
        self.matches_sender(sender) && self.matches_received(received_at)
    }
}

impl std::fmt::Display for MessageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(from.address = {0:?} OR from.name = {0:?})",
            self.sender
        )?;
        if let Some(from) = self.received_from {
            write!(f, " AND received >= {}", from.to_rfc3339())?;
        }
        if let Some(before) = self.received_before {
            write!(f, " AND received < {}", before.to_rfc3339())?;
        }
        Ok(())
    }
}
