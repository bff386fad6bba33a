//! Envelope extraction: sender, subject and date from a raw header block.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use tracing::warn;

use crate::model::address::EmailAddress;

/// The header fields a search needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: EmailAddress,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
}

/// Parse the header block of one message.
///
/// `raw_headers` may start with an MBOX `From ` separator line; its date is
/// used when the `Date:` header is missing or unreadable.
pub fn parse_envelope(raw_headers: &[u8]) -> Envelope {
    let (separator, headers) = split_separator(raw_headers);

    // mail-parser needs the end-of-headers marker to stop looking for more.
    let mut block = headers.to_vec();
    block.extend_from_slice(b"\n\n");
    let parsed = MessageParser::default().parse(&block);

    let from = parsed
        .as_ref()
        .and_then(|msg| msg.from())
        .and_then(|addr| addr.first())
        .map(|addr| {
            EmailAddress::new(
                addr.name().unwrap_or_default().trim(),
                addr.address().unwrap_or_default().trim(),
            )
        })
        .filter(|addr| !addr.address.is_empty() || !addr.display_name.is_empty())
        .or_else(|| raw_header_value(headers, "from").map(|v| EmailAddress::parse(&v)))
        .unwrap_or_default();

    let subject = parsed
        .as_ref()
        .and_then(|msg| msg.subject())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let date = parsed
        .as_ref()
        .and_then(|msg| msg.date())
        .and_then(|dt| DateTime::from_timestamp(dt.to_timestamp(), 0))
        .or_else(|| raw_header_value(headers, "date").and_then(|v| parse_date(&v)))
        .or_else(|| separator.and_then(separator_date));

    Envelope {
        from,
        subject,
        date,
    }
}

/// Split off a leading `From ` separator line, if any.
fn split_separator(raw: &[u8]) -> (Option<&[u8]>, &[u8]) {
    let raw = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(raw);
    if raw.starts_with(b"From ") {
        match raw.iter().position(|&b| b == b'\n') {
            Some(pos) => (Some(&raw[..pos]), &raw[pos + 1..]),
            None => (Some(raw), &raw[raw.len()..]),
        }
    } else {
        (None, raw)
    }
}

/// First value of a header, unfolded, without any decoding.
fn raw_header_value(headers: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(headers);
    let mut value: Option<String> = None;

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((key, rest)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }

    value
}

/// Date from an MBOX separator: `From sender Thu Jan  4 10:00:00 2024`.
fn separator_date(line: &[u8]) -> Option<DateTime<Utc>> {
    let text = String::from_utf8_lossy(line);
    let rest: Vec<&str> = text.split_whitespace().skip(2).take(5).collect();
    if rest.len() < 5 {
        return None;
    }
    // Weekday is ignored: it is often wrong in old archives.
    let candidate = format!("{} {} {} {}", rest[1], rest[2], rest[3], rest[4]);
    NaiveDateTime::parse_from_str(&candidate, "%b %d %H:%M:%S %Y")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Parse the broken date formats mail-parser gives up on.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let without_weekday = strip_day_of_week(trimmed);
    let candidate = replace_named_tz(without_weekday);

    const WITH_OFFSET: [&str; 3] = [
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S %z",
        "%d-%b-%Y %H:%M:%S %z",
    ];
    const NAIVE: [&str; 5] = [
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%d-%b-%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    for fmt in WITH_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim_start();
        }
    }
    s
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    // Longest names first: "CEST" also ends with "EST".
    const ZONES: [(&str, &str); 12] = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
    ];
    for (name, offset) in ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_with_encoded_words() {
        let raw = b"From alice@example.com Thu Jan 04 10:00:00 2024\nFrom: =?UTF-8?B?SsO8cmdlbg==?= <jurgen@example.com>\nSubject: =?UTF-8?Q?Caf=C3=A9_invoices?=\nDate: Thu, 04 Jan 2024 10:00:00 +0000\n";
        let env = parse_envelope(raw);
        assert_eq!(env.from.address, "jurgen@example.com");
        assert_eq!(env.from.display_name, "Jürgen");
        assert_eq!(env.subject, "Café invoices");
        assert_eq!(
            env.date.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2024-01-04 10:00"
        );
    }

    #[test]
    fn test_envelope_falls_back_to_separator_date() {
        let raw = b"From bob@example.com Fri Feb  9 08:30:00 2024\nFrom: bob@example.com\nSubject: no date\n";
        let env = parse_envelope(raw);
        assert_eq!(env.from.address, "bob@example.com");
        assert_eq!(
            env.date.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-02-09 08:30:00"
        );
    }

    #[test]
    fn test_envelope_without_separator() {
        let raw = b"From: Carol <carol@example.com>\nSubject: eml\nDate: 2024-03-01T12:00:00Z\n";
        let env = parse_envelope(raw);
        assert_eq!(env.from.display_name, "Carol");
        assert!(env.date.is_some());
    }

    #[test]
    fn test_raw_header_value_unfolds() {
        let headers = b"Subject: first\n\tsecond\nFrom: x@y.z\n";
        assert_eq!(
            raw_header_value(headers, "subject").as_deref(),
            Some("first second")
        );
        assert_eq!(raw_header_value(headers, "FROM").as_deref(), Some("x@y.z"));
        assert_eq!(raw_header_value(headers, "date"), None);
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-Jul-2025 03:01:03 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }
}
