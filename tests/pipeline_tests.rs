//! End-to-end runs against an in-memory mailbox.

mod common;

use std::sync::mpsc;

use assert_fs::prelude::*;
use chrono::NaiveDate;
use predicates::prelude::*;

use common::{drain, test_options, utc, MemoryMailbox};
use mailharvest::export::{run_download, RunOutcome};
use mailharvest::model::attachment::AttachmentKind::{ByValue, EmbeddedMessage, Inline};
use mailharvest::model::criteria::{DownloadRequest, JobInput};
use mailharvest::report::{Progress, Reporter, RunEvent, RunPhase};
use mailharvest::{spawn_download, CancelToken};

const ALICE: &str = "alice@example.com";

fn request(root: &std::path::Path, types: &str) -> DownloadRequest {
    JobInput {
        sender: ALICE.to_string(),
        destination: Some(root.to_path_buf()),
        allowed_extensions_csv: types.to_string(),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

fn dated_request(
    root: &std::path::Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> DownloadRequest {
    JobInput {
        sender: ALICE.to_string(),
        from_date: from,
        to_date: to,
        destination: Some(root.to_path_buf()),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

fn position(events: &[RunEvent], wanted: impl Fn(&RunEvent) -> bool) -> usize {
    events
        .iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("event not found in {events:#?}"))
}

fn log_lines(reporter: &Reporter) -> Vec<String> {
    reporter
        .entries()
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_same_day_same_subject_share_one_folder() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("out");
    let mailbox = MemoryMailbox::new()
        .with_message(
            "Alice <alice@example.com>",
            "Invoice",
            utc(2024, 3, 1, 9, 0, 0),
            vec![
                ("invoice.pdf", ByValue, "first"),
                ("logo.png", Inline, "png"),
            ],
        )
        .with_message(
            ALICE,
            "Invoice",
            utc(2024, 3, 1, 17, 0, 0),
            vec![
                ("invoice.pdf", ByValue, "second"),
                ("notes.txt", ByValue, "notes"),
            ],
        );

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(out.path(), ".pdf"),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.total_attachments, 2);
    assert_eq!(summary.state.downloaded_attachments, 2);
    assert_eq!(summary.state.failed_attachments, 0);
    assert_eq!(summary.bytes_written, 11);

    let folder = out.child("2024-03-01_Invoice");
    folder.child("invoice.pdf").assert("first");
    folder.child("invoice_1.pdf").assert("second");
    folder.child("logo.png").assert(predicate::path::missing());
    folder.child("notes.txt").assert(predicate::path::missing());

    let folders = std::fs::read_dir(out.path()).unwrap().count();
    assert_eq!(folders, 1);

    assert_eq!(reporter.phase(), RunPhase::Completed);
    assert_eq!(
        reporter.status(),
        "Download completed - 2 attachments downloaded"
    );
    let lines = log_lines(&reporter);
    assert!(lines.contains(&"  ✓ Downloaded: invoice.pdf (5 B)".to_string()));
    assert!(lines.contains(&"  ✓ Downloaded: invoice_1.pdf (6 B)".to_string()));
    assert!(lines.contains(&"Processing email: Invoice (2024-03-01 09:00)".to_string()));
    assert!(lines.contains(&"Total attachments to download: 2".to_string()));
    assert!(mailbox.released());
}

#[test]
fn test_message_without_attachments_gets_no_folder() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new()
        .with_message(
            ALICE,
            "With files",
            utc(2024, 3, 4, 10, 0, 0),
            vec![
                ("budget.xlsx", ByValue, "numbers"),
                ("Re: budget", EmbeddedMessage, "mail"),
            ],
        )
        .with_message(ALICE, "Thanks", utc(2024, 3, 5, 10, 0, 0), vec![]);

    let summary = run_download(
        &mailbox,
        &dated_request(
            temp.path(),
            NaiveDate::from_ymd_opt(2024, 3, 1),
            NaiveDate::from_ymd_opt(2024, 3, 31),
        ),
        &test_options(),
        &CancelToken::new(),
        &mut Reporter::new(),
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.total_attachments, 1);
    assert_eq!(summary.state.downloaded_attachments, 1);
    temp.child("2024-03-04_With files/budget.xlsx").assert("numbers");
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn test_empty_filter_takes_every_by_value_attachment() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "Mixed",
        utc(2024, 5, 2, 12, 0, 0),
        vec![
            ("a.pdf", ByValue, "a"),
            ("README", ByValue, "r"),
            ("fwd.eml", EmbeddedMessage, "m"),
            ("sig.png", Inline, "s"),
        ],
    );

    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut Reporter::new(),
    );

    assert_eq!(summary.state.total_attachments, 2);
    assert_eq!(summary.state.downloaded_attachments, 2);
    let folder = temp.child("2024-05-02_Mixed");
    folder.child("a.pdf").assert("a");
    folder.child("README").assert("r");
    folder.child("fwd.eml").assert(predicate::path::missing());
}

#[test]
fn test_names_are_sanitized_and_existing_files_kept() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "Q1: report",
        utc(2024, 3, 1, 8, 0, 0),
        vec![
            ("Report: Q1?*.pdf", ByValue, "new"),
            ("../../etc/passwd.pdf", ByValue, "sneaky"),
        ],
    );

    // Folder names go through the same sanitizer.
    let folder = temp.child("2024-03-01_Q1_ report");
    folder.create_dir_all().unwrap();
    folder.child("Report_ Q1__.pdf").write_str("old").unwrap();

    let summary = run_download(
        &mailbox,
        &request(temp.path(), ".pdf"),
        &test_options(),
        &CancelToken::new(),
        &mut Reporter::new(),
    );

    assert_eq!(summary.state.downloaded_attachments, 2);
    folder.child("Report_ Q1__.pdf").assert("old");
    folder.child("Report_ Q1___1.pdf").assert("new");
    folder.child("....etcpasswd.pdf").assert("sneaky");
    temp.child("etc").assert(predicate::path::missing());
}

#[test]
fn test_to_date_includes_whole_day() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new()
        .with_message(
            ALICE,
            "late",
            utc(2024, 3, 31, 23, 59, 59),
            vec![("late.pdf", ByValue, "l")],
        )
        .with_message(
            ALICE,
            "next",
            utc(2024, 4, 1, 0, 0, 0),
            vec![("next.pdf", ByValue, "n")],
        )
        .with_message(
            ALICE,
            "early",
            utc(2024, 3, 30, 23, 59, 59),
            vec![("early.pdf", ByValue, "e")],
        );

    let day = NaiveDate::from_ymd_opt(2024, 3, 31);
    let summary = run_download(
        &mailbox,
        &dated_request(temp.path(), day, day),
        &test_options(),
        &CancelToken::new(),
        &mut Reporter::new(),
    );

    assert_eq!(summary.state.downloaded_attachments, 1);
    temp.child("2024-03-31_late/late.pdf").assert("l");
    temp.child("2024-04-01_next").assert(predicate::path::missing());
    temp.child("2024-03-30_early").assert(predicate::path::missing());
}

#[test]
fn test_other_senders_are_ignored() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new()
        .with_message(
            "bob@example.com",
            "from bob",
            utc(2024, 3, 1, 8, 0, 0),
            vec![("bob.pdf", ByValue, "b")],
        )
        .with_message(
            "ALICE@example.com",
            "case differs",
            utc(2024, 3, 1, 8, 0, 0),
            vec![("upper.pdf", ByValue, "u")],
        );

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.total_attachments, 0);
    assert_eq!(reporter.status(), "No emails found");
    assert!(log_lines(&reporter).contains(&"No emails found matching the criteria.".to_string()));
}

#[test]
fn test_no_eligible_attachments() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "pictures",
        utc(2024, 3, 1, 8, 0, 0),
        vec![("photo.jpg", ByValue, "j")],
    );

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(temp.path(), ".pdf"),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(reporter.status(), "No attachments found");
    assert!(log_lines(&reporter).contains(&"No attachments found in the emails.".to_string()));
    temp.child("2024-03-01_pictures").assert(predicate::path::missing());
}

#[test]
fn test_inverted_range_matches_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "any",
        utc(2024, 3, 15, 8, 0, 0),
        vec![("a.pdf", ByValue, "a")],
    );

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &dated_request(
            temp.path(),
            NaiveDate::from_ymd_opt(2024, 3, 20),
            NaiveDate::from_ymd_opt(2024, 3, 10),
        ),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(reporter.status(), "No emails found");
}

#[test]
fn test_cancel_after_two_saves() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cancel = CancelToken::new();
    let mailbox = MemoryMailbox::new()
        .with_message(
            ALICE,
            "batch one",
            utc(2024, 3, 1, 8, 0, 0),
            vec![
                ("1.pdf", ByValue, "1"),
                ("2.pdf", ByValue, "2"),
                ("3.pdf", ByValue, "3"),
            ],
        )
        .with_message(
            ALICE,
            "batch two",
            utc(2024, 3, 2, 8, 0, 0),
            vec![("4.pdf", ByValue, "4"), ("5.pdf", ByValue, "5")],
        )
        .cancel_after(2, cancel.clone());

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &cancel,
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.state.total_attachments, 5);
    assert_eq!(summary.state.downloaded_attachments, 2);
    assert_eq!(summary.saved.len(), 2);
    assert_eq!(mailbox.saves(), 2);

    temp.child("2024-03-01_batch one/1.pdf").assert("1");
    temp.child("2024-03-01_batch one/2.pdf").assert("2");
    temp.child("2024-03-01_batch one/3.pdf").assert(predicate::path::missing());
    temp.child("2024-03-02_batch two").assert(predicate::path::missing());

    assert_eq!(reporter.phase(), RunPhase::Cancelled);
    assert_eq!(reporter.status(), "Download cancelled");
    assert_eq!(
        log_lines(&reporter).last().map(String::as_str),
        Some("Download cancelled by user.")
    );
    assert!(mailbox.released());
}

#[test]
fn test_cancel_before_counting() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "never",
        utc(2024, 3, 1, 8, 0, 0),
        vec![("a.pdf", ByValue, "a")],
    );

    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &cancel,
        &mut Reporter::new(),
    );

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.state.total_attachments, 0);
    assert_eq!(mailbox.saves(), 0);
}

#[test]
fn test_single_attachment_failure_does_not_stop_run() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new()
        .with_message(
            ALICE,
            "three",
            utc(2024, 3, 1, 8, 0, 0),
            vec![
                ("a.pdf", ByValue, "a"),
                ("b.pdf", ByValue, "b"),
                ("c.pdf", ByValue, "c"),
            ],
        )
        .failing_attachment(0, 1);

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.total_attachments, 3);
    assert_eq!(summary.state.downloaded_attachments, 2);
    assert_eq!(summary.state.failed_attachments, 1);
    assert!(summary.state.downloaded_attachments < summary.state.total_attachments);

    temp.child("2024-03-01_three/c.pdf").assert("c");
    let failure = log_lines(&reporter)
        .into_iter()
        .find(|l| l.starts_with("  ✗ Failed to download b.pdf: "));
    assert!(failure.is_some_and(|l| l.contains("attachment blob missing")));
    assert_eq!(
        reporter.status(),
        "Download completed - 2 attachments downloaded"
    );
}

#[test]
fn test_unreadable_size_still_counts_as_downloaded() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new()
        .with_message(ALICE, "sizes", utc(2024, 3, 1, 8, 0, 0), vec![("a.pdf", ByValue, "a")])
        .without_files();

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.downloaded_attachments, 1);
    assert_eq!(summary.state.failed_attachments, 0);
    assert_eq!(summary.bytes_written, 0);
    assert!(log_lines(&reporter).contains(&"  ✓ Downloaded: a.pdf (size unknown)".to_string()));
}

#[test]
fn test_connection_failure_is_fatal() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("out");
    let mailbox = MemoryMailbox::new().failing_connect();

    let mut reporter = Reporter::new();
    let summary = run_download(
        &mailbox,
        &request(out.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );

    match &summary.outcome {
        RunOutcome::Failed { reason } => assert!(reason.contains("server unreachable")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(reporter.phase(), RunPhase::Failed);
    assert_eq!(reporter.status(), "Download failed");

    let errors: Vec<String> = log_lines(&reporter)
        .into_iter()
        .filter(|l| l.starts_with("Error: "))
        .collect();
    assert_eq!(errors.len(), 1);
    out.assert(predicate::path::missing());
}

#[test]
fn test_search_failure_releases_session() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().failing_search();

    let summary = run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut Reporter::new(),
    );

    assert!(matches!(summary.outcome, RunOutcome::Failed { .. }));
    assert!(mailbox.released());
}

#[test]
fn test_event_order() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "pair",
        utc(2024, 3, 1, 8, 0, 0),
        vec![("a.pdf", ByValue, "a"), ("b.pdf", ByValue, "b")],
    );

    let (tx, rx) = mpsc::channel();
    let mut reporter = Reporter::with_sink(tx);
    run_download(
        &mailbox,
        &request(temp.path(), ""),
        &test_options(),
        &CancelToken::new(),
        &mut reporter,
    );
    let events = drain(&rx);

    let phases: Vec<RunPhase> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Phase(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![RunPhase::Counting, RunPhase::Downloading, RunPhase::Completed]
    );

    let progress: Vec<Progress> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(progress
        .windows(2)
        .all(|w| w[0].downloaded <= w[1].downloaded));
    assert!(progress.iter().all(|p| p.downloaded <= p.total));
    assert_eq!(
        progress.last(),
        Some(&Progress {
            downloaded: 2,
            total: 2
        })
    );

    let first_progress = position(&events, |e| {
        matches!(e, RunEvent::Progress(Progress { downloaded: 1, .. }))
    });
    let first_saved_log = position(&events, |e| {
        matches!(e, RunEvent::Log(entry) if entry.message.starts_with("  ✓ Downloaded: a.pdf"))
    });
    let second_progress = position(&events, |e| {
        matches!(e, RunEvent::Progress(Progress { downloaded: 2, .. }))
    });
    assert!(first_progress < first_saved_log);
    assert!(first_saved_log < second_progress);

    match events.iter().find(|e| matches!(e, RunEvent::Log(_))) {
        Some(RunEvent::Log(entry)) => assert_eq!(entry.message, "Starting download process..."),
        other => panic!("unexpected first log event: {other:?}"),
    }
}

#[test]
fn test_spawned_run_streams_events() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mailbox = MemoryMailbox::new().with_message(
        ALICE,
        "background",
        utc(2024, 3, 1, 8, 0, 0),
        vec![("a.pdf", ByValue, "a")],
    );

    let handle = spawn_download(mailbox, request(temp.path(), ""), test_options()).unwrap();
    let events: Vec<RunEvent> = handle.events().iter().collect();
    let summary = handle.wait();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.state.downloaded_attachments, 1);
    assert_eq!(
        events.last(),
        Some(&RunEvent::Phase(RunPhase::Completed))
    );
    temp.child("2024-03-01_background/a.pdf").assert("a");
}
