//! CLI entry point for `mailharvest`.

use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailharvest::config::{self, Config};
use mailharvest::export::plan::DownloadPlan;
use mailharvest::export::sanitize::sanitize_file_name;
use mailharvest::export::{run_download, DownloadOptions, RunOutcome, RunSummary};
use mailharvest::model::criteria::{DownloadRequest, JobInput};
use mailharvest::provider::{LocalMailbox, Mailbox, MailboxSession};
use mailharvest::report::{Reporter, RunEvent};
use mailharvest::search::MessageFilter;
use mailharvest::CancelToken;

#[derive(Parser)]
#[command(
    name = "mailharvest",
    version,
    about = "Download every attachment one sender mailed you",
    after_help = "MAILBOX may be an MBOX file, a single .eml file, or a directory of .eml files."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save matching attachments into per-message folders
    Download {
        #[command(flatten)]
        job: JobArgs,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what would be downloaded without writing anything
    Plan {
        #[command(flatten)]
        job: JobArgs,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args)]
struct JobArgs {
    /// Mailbox to read
    #[arg(value_name = "MAILBOX")]
    mailbox: PathBuf,

    /// Sender address or display name to match exactly
    #[arg(short, long)]
    sender: String,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    to: Option<NaiveDate>,

    /// Only the last N days, ending today (default: config `default_days`, 30)
    #[arg(long, value_name = "N", conflicts_with_all = ["from", "to"])]
    days: Option<u32>,

    /// Destination folder
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Allowed extensions, comma separated (e.g. ".pdf,.xlsx")
    #[arg(short = 't', long = "types", value_name = "CSV")]
    file_types: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Download { job, json } => cmd_download(&job, json, &config),
        Commands::Plan { job, json } => cmd_plan(&job, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailharvest.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailharvest", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Merge command-line arguments with configured defaults.
fn job_input(job: &JobArgs, config: &Config) -> JobInput {
    let no_dates = job.from.is_none() && job.to.is_none();
    let days = job.days.or(if no_dates {
        config.lookback_days()
    } else {
        None
    });

    let (from_date, to_date) = match days {
        Some(days) => {
            let today = config.general.timezone.date_of(Utc::now());
            (today.checked_sub_days(Days::new(u64::from(days))), Some(today))
        }
        None => (job.from, job.to),
    };

    JobInput {
        sender: job.sender.clone(),
        from_date,
        to_date,
        destination: job
            .output
            .clone()
            .or_else(|| config::default_destination(config)),
        allowed_extensions_csv: job
            .file_types
            .clone()
            .unwrap_or_else(|| config.download.file_types.clone()),
    }
}

/// Download attachments, rendering the run log above a progress bar.
fn cmd_download(job: &JobArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let request = job_input(job, config).validate()?;
    let destination = request.destination.clone();
    let mailbox = LocalMailbox::new(&job.mailbox);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(drive_download(
        mailbox,
        request,
        config.download_options(),
        !json,
    ))?;

    if json {
        let output = serde_json::json!({
            "destination": destination.to_string_lossy(),
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary_table(&summary, &destination);
    }

    if let RunOutcome::Failed { reason } = summary.outcome {
        anyhow::bail!("Download failed: {reason}");
    }
    Ok(())
}

/// Run the download on a blocking thread and forward its events to the
/// terminal. Ctrl-C requests cancellation instead of killing the process.
async fn drive_download(
    mailbox: LocalMailbox,
    request: DownloadRequest,
    options: DownloadOptions,
    interactive: bool,
) -> anyhow::Result<RunSummary> {
    let cancel = CancelToken::new();
    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();

    let worker_cancel = cancel.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let mut reporter = Reporter::with_sink(tx);
        run_download(&mailbox, &request, &options, &worker_cancel, &mut reporter)
    });

    let pb = if interactive {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut interrupt = std::pin::pin!(shutdown_signal());
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => render_event(&pb, event, interactive),
                None => break,
            },
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                pb.println("Cancelling after the current attachment...");
                cancel.cancel();
            }
        }
    }
    pb.finish_and_clear();

    Ok(worker.await?)
}

fn render_event(pb: &ProgressBar, event: RunEvent, show_log: bool) {
    match event {
        RunEvent::Log(entry) => {
            if show_log {
                pb.println(entry.to_string());
            }
        }
        RunEvent::Status(text) => pb.set_message(text),
        RunEvent::Progress(progress) => {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.downloaded as u64);
        }
        RunEvent::Phase(phase) => tracing::debug!(%phase, "Run phase changed"),
    }
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}

/// Print the run summary as a human-readable table.
fn print_summary_table(summary: &RunSummary, destination: &Path) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Outcome", summary.outcome.phase());
    println!(
        "  {:<20} {}/{}",
        "Downloaded", summary.state.downloaded_attachments, summary.state.total_attachments
    );
    if summary.state.failed_attachments > 0 {
        println!("  {:<20} {}", "Failed", summary.state.failed_attachments);
    }
    println!(
        "  {:<20} {}",
        "Written",
        format_size(summary.bytes_written, BINARY)
    );
    println!("  {:<20} {}", "Destination", destination.display());
    if let RunOutcome::Failed { reason } = &summary.outcome {
        println!("  {:<20} {}", "Error", reason);
    }
    println!();
}

/// List the folders and files a download would produce.
fn cmd_plan(job: &JobArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let request = job_input(job, config).validate()?;
    let basis = config.general.timezone;

    let mailbox = LocalMailbox::new(&job.mailbox);
    let mut session = mailbox.connect()?;
    let filter = MessageFilter::build(&request.criteria, basis);
    let messages = session.search(&filter)?;
    let plan = DownloadPlan::build(
        &messages,
        &request.filter,
        &request.destination,
        basis,
        &CancelToken::new(),
    )
    .unwrap_or_default();

    let rows: Vec<(&str, String, &Path, Vec<String>)> = plan
        .messages
        .iter()
        .map(|planned| {
            let message = &messages[planned.message];
            let files = planned
                .eligible
                .iter()
                .filter_map(|index| message.attachments.iter().find(|a| a.index == *index))
                .map(|a| sanitize_file_name(&a.file_name))
                .collect();
            (
                message.subject.as_str(),
                basis.format(message.received_at, "%Y-%m-%d %H:%M"),
                planned.folder.as_path(),
                files,
            )
        })
        .collect();

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(subject, received, folder, files)| {
                serde_json::json!({
                    "subject": subject,
                    "received": received,
                    "folder": folder.to_string_lossy(),
                    "attachments": files,
                })
            })
            .collect();
        let output = serde_json::json!({
            "filter": filter.to_string(),
            "file_types": request.filter.to_string(),
            "messages_found": messages.len(),
            "total_attachments": plan.total_eligible,
            "messages": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {:<20} {}", "Filter", filter);
    println!("  {:<20} {}", "File types", request.filter);
    println!("  {:<20} {}", "Messages found", messages.len());
    println!("  {:<20} {}", "Attachments", plan.total_eligible);
    println!();
    for (subject, received, folder, files) in &rows {
        let subj_trunc: String = subject.chars().take(50).collect();
        println!("  {received}  {subj_trunc}");
        println!("    -> {}", folder.display());
        for file in files {
            println!("       {file}");
        }
    }
    if !rows.is_empty() {
        println!();
    }
    Ok(())
}
