//! Running a download on a background thread.
//!
//! The worker owns the mailbox and the reporter. The caller keeps the
//! receiving end of the event channel and a [`CancelToken`] clone, so it can
//! render progress and request a stop without touching the run itself.

use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use crate::cancel::CancelToken;
use crate::export::{run_download, DownloadOptions, RunSummary};
use crate::model::criteria::DownloadRequest;
use crate::provider::Mailbox;
use crate::report::{Reporter, RunEvent};

/// Handle to a run started with [`spawn_download`].
pub struct RunHandle {
    cancel: CancelToken,
    events: Receiver<RunEvent>,
    join: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Ask the run to stop at the next cancellation point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Events in the order the run produced them. The channel closes when the
    /// run is over.
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the run ends.
    pub fn wait(self) -> RunSummary {
        self.join
            .join()
            .unwrap_or_else(|_| RunSummary::failed("download worker panicked"))
    }
}

/// Start a download on its own thread and return immediately.
pub fn spawn_download<M>(
    mailbox: M,
    request: DownloadRequest,
    options: DownloadOptions,
) -> std::io::Result<RunHandle>
where
    M: Mailbox + Send + 'static,
{
    let cancel = CancelToken::new();
    let (tx, events) = mpsc::channel();

    let worker_cancel = cancel.clone();
    let join = std::thread::Builder::new()
        .name("mailharvest-download".into())
        .spawn(move || {
            let mut reporter = Reporter::with_sink(tx);
            run_download(&mailbox, &request, &options, &worker_cancel, &mut reporter)
        })?;

    Ok(RunHandle {
        cancel,
        events,
        join,
    })
}
