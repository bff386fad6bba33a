//! Run reporting: status text, a timestamped log, and download progress.
//!
//! The executor is the only producer. Every change is pushed to an
//! [`EventSink`] immediately, so a presentation layer sees events in the
//! order they happened and before the next unit of work starts.

use chrono::{DateTime, Local};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Counting,
    Downloading,
    Completed,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Counting => "counting",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// `(downloaded, total)` attachment counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    pub downloaded: usize,
    pub total: usize,
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Everything a presentation layer can observe during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Phase(RunPhase),
    Status(String),
    Log(LogEntry),
    Progress(Progress),
}

/// Receiver side of the reporter, usually the sending half of a channel.
pub trait EventSink: Send {
    fn emit(&mut self, event: RunEvent);
}

impl EventSink for std::sync::mpsc::Sender<RunEvent> {
    fn emit(&mut self, event: RunEvent) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.send(event);
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<RunEvent> {
    fn emit(&mut self, event: RunEvent) {
        let _ = self.send(event);
    }
}

/// Accumulates the log and counters of the current run.
pub struct Reporter {
    sink: Option<Box<dyn EventSink>>,
    log: Vec<LogEntry>,
    status: String,
    phase: RunPhase,
    progress: Progress,
}

impl Default for Reporter {
    fn default() -> Self {
        Self {
            sink: None,
            log: Vec::new(),
            status: String::new(),
            phase: RunPhase::Idle,
            progress: Progress::default(),
        }
    }
}

impl Reporter {
    /// A reporter that only keeps state locally.
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter that also forwards every change to `sink`.
    pub fn with_sink(sink: impl EventSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            ..Self::default()
        }
    }

    /// Clear log and counters before a new run.
    pub fn reset(&mut self) {
        self.log.clear();
        self.status.clear();
        self.phase = RunPhase::Idle;
        self.progress = Progress::default();
        self.emit(RunEvent::Progress(self.progress));
    }

    /// Append a timestamped log line.
    pub fn append(&mut self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        };
        tracing::debug!(message = %entry.message, "run log");
        self.log.push(entry.clone());
        self.emit(RunEvent::Log(entry));
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
        tracing::info!(status = %self.status, "status");
        self.emit(RunEvent::Status(self.status.clone()));
    }

    pub fn set_phase(&mut self, phase: RunPhase) {
        if self.phase == phase {
            return;
        }
        tracing::debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
        self.emit(RunEvent::Phase(phase));
    }

    /// Announce how many attachments the run will try to save.
    pub fn set_total(&mut self, total: usize) {
        self.progress.total = total;
        self.emit(RunEvent::Progress(self.progress));
    }

    /// Count one more saved attachment. Never exceeds the announced total.
    pub fn record_download(&mut self) {
        if self.progress.downloaded < self.progress.total {
            self.progress.downloaded += 1;
        }
        self.emit(RunEvent::Progress(self.progress));
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.log
    }

    fn emit(&mut self, event: RunEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.emit(event);
        }
    }
}
