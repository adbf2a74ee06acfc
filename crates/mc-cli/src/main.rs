//! CLI entry point for mediacheck.
//!
//! This binary checks a media library for corrupt or policy-violating files
//! and asks Sonarr, Radarr or Lidarr to replace them.
//!
//! # Usage
//!
//! ```bash
//! mediacheck [OPTIONS] <COMMAND>
//!
//! # Scan once and print a summary
//! mediacheck --config mediacheck.toml check
//!
//! # Scan every six hours; SIGHUP forces a rescan
//! mediacheck daemon --interval 21600
//!
//! # Inspect and prune recorded bad files
//! mediacheck bad-files list --json
//! mediacheck bad-files delete 1 3
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use mc_connect::{NotificationQueue, OwnerRegistry, notifiers_from_config};
use mc_core::{Config, LoggingConfig, StatsSnapshot};
use mc_probe::FfmpegProber;
use mc_scanner::{RunOutcome, RunReport, ScanContext, ScanError, Scanner, TriggerOutcome};
use mc_store::Store;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to queued notifications after a run.
const NOTIFY_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Media library integrity scanner.
///
/// Walks the configured roots, verifies every media file with ffprobe and
/// ffmpeg, and hands bad files to the media manager that owns them.
#[derive(Parser)]
#[command(name = "mediacheck", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON).
    ///
    /// Defaults to `mediacheck.*` in the working directory if present.
    #[arg(short, long, global = true, env = "MEDIACHECK_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one scan and print a summary.
    Check,

    /// Scan on a fixed interval until interrupted.
    Daemon {
        /// Seconds between scans.
        #[arg(short, long, default_value_t = 86_400, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },

    /// Inspect recorded bad files.
    #[command(subcommand)]
    BadFiles(BadFilesCommand),

    /// Print persisted run statistics as JSON.
    #[command(subcommand)]
    Stats(StatsCommand),
}

#[derive(Subcommand)]
enum BadFilesCommand {
    /// List bad files with their 1-based index.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Delete bad-file records by index.
    Delete {
        /// Indices as printed by `bad-files list`.
        #[arg(required = true, value_parser = clap::value_parser!(u64).range(1..))]
        indices: Vec<u64>,
    },
}

#[derive(Subcommand)]
enum StatsCommand {
    /// The current or most recent run.
    Current,
    /// Up to the last 30 finished runs, oldest first.
    History,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `debug` with
/// `--verbose`, else `logging.level`, else `info`. When `logging.file` is
/// set a second, uncolored layer writes there; the returned guard must be
/// held until exit.
fn init_tracing(verbose: bool, no_color: bool, logging: &LoggingConfig) -> color_eyre::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            logging.level.as_deref().unwrap_or("info")
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn,rusqlite=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var_os("NO_COLOR").is_none();

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(log_appender(path)?);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

fn log_appender(path: &Utf8Path) -> color_eyre::Result<tracing_appender::rolling::RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| eyre!("logging.file has no file name: {path}"))?;
    let dir = path.parent().filter(|dir| !dir.as_str().is_empty()).unwrap_or(Utf8Path::new("."));
    Ok(tracing_appender::rolling::never(dir, name))
}

/// Opens the store and closes out a run that never finished.
fn open_store(config: &Config) -> color_eyre::Result<Arc<Store>> {
    let store = Store::open(&config.store.path)
        .wrap_err_with(|| format!("Failed to open database {}", config.store.path))?;
    if let Some(recovered) = store.recover_interrupted_run()? {
        warn!(files = recovered.files_checked, "Previous run was interrupted; its statistics were closed out");
    }
    Ok(Arc::new(store))
}

/// Builds a scanner with connected owners and a running notification queue.
async fn build_scanner(config: &Config) -> color_eyre::Result<(Scanner, NotificationQueue)> {
    config.validate()?;
    let store = open_store(config)?;

    let prober = FfmpegProber::from_config(&config.probe);
    if config.probe.ffprobe && !prober.is_available().await {
        return Err(eyre!("ffprobe not found at `{}`", config.probe.ffprobe_path));
    }

    let mut owners = OwnerRegistry::from_config(&config.owners)?;
    owners.connect_all().await;
    if owners.is_empty() {
        warn!("No media manager connected; bad files will only be recorded");
    }

    let channels = notifiers_from_config(&config.notifications)?;
    let queue = NotificationQueue::spawn(channels, config.notifications.queue_capacity);

    let scanner = Scanner::new(
        ScanContext::new(config, store, Arc::new(prober))
            .with_owners(owners)
            .with_notifications(queue.sender()),
    );
    Ok((scanner, queue))
}

// =============================================================================
// SIGNALS
// =============================================================================

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(unix)]
type Hangup = tokio::signal::unix::Signal;

#[cfg(not(unix))]
type Hangup = ();

#[cfg(unix)]
fn hangup() -> io::Result<Hangup> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn hangup() -> io::Result<Hangup> {
    Ok(())
}

#[cfg(unix)]
async fn next_hangup(signal: &mut Hangup) -> Option<()> {
    signal.recv().await
}

#[cfg(not(unix))]
async fn next_hangup(_signal: &mut Hangup) -> Option<()> {
    std::future::pending().await
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs one scan; a shutdown signal cancels it.
async fn run_check(config: &Config) -> color_eyre::Result<()> {
    let (scanner, queue) = build_scanner(config).await?;

    let token = CancellationToken::new();
    let watcher = tokio::spawn({
        let token = token.clone();
        async move {
            if shutdown_signal().await.is_ok() {
                info!("Shutdown requested; finishing current file");
                token.cancel();
            }
        }
    });

    let result = scanner.run(token).await;
    watcher.abort();
    queue.shutdown(NOTIFY_GRACE).await;

    match result? {
        RunOutcome::Completed(report) => print_run_summary(&report),
        RunOutcome::Busy => print_line("A scan is already running"),
    }
    Ok(())
}

/// Scans every `interval` seconds until a shutdown signal.
async fn run_daemon(config: &Config, interval: u64) -> color_eyre::Result<()> {
    let (scanner, queue) = build_scanner(config).await?;
    info!(interval_secs = interval, "Daemon started");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut hangup = hangup()?;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let root = CancellationToken::new();
    let mut active: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => start_run(&scanner, &root, &mut active),
            Some(()) = next_hangup(&mut hangup) => {
                info!("SIGHUP received; rescanning");
                start_run(&scanner, &root, &mut active);
            }
            result = &mut shutdown => {
                result?;
                break;
            }
        }
    }

    info!("Shutdown requested");
    root.cancel();
    if let Some(handle) = active {
        if let Err(err) = handle.await {
            error!(error = %err, "Scan task failed");
        }
    }
    queue.shutdown(NOTIFY_GRACE).await;
    Ok(())
}

fn start_run(scanner: &Scanner, root: &CancellationToken, active: &mut Option<JoinHandle<()>>) {
    match scanner.trigger(root.child_token()) {
        TriggerOutcome::Started(handle) => {
            *active = Some(tokio::spawn(async move { log_run(handle.await) }));
        }
        TriggerOutcome::Busy => info!("Scan still running; waiting for the next tick"),
    }
}

fn log_run(result: Result<Result<RunReport, ScanError>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(report)) => {
            let stats = &report.stats;
            info!(
                files = stats.files_checked,
                submissions = stats.total_submissions(),
                walk_failures = report.walk_failures.len(),
                interrupted = report.interrupted,
                "Run complete"
            );
        }
        Ok(Err(err)) => error!(error = %err, "Scan failed"),
        Err(err) => error!(error = %err, "Scan task failed"),
    }
}

fn run_bad_files(config: &Config, command: &BadFilesCommand) -> color_eyre::Result<()> {
    let store = open_store(config)?;
    match command {
        BadFilesCommand::List { json: true } => print_json(&store.list_bad_files()?),
        BadFilesCommand::List { json: false } => {
            let entries = store.list_bad_files()?;
            let mut out = io::stdout().lock();
            if entries.is_empty() {
                writeln!(out, "No bad files recorded")?;
            }
            for (index, entry) in entries.iter().enumerate() {
                writeln!(
                    out,
                    "{:>4}  {:<8} {:<18} {}",
                    index + 1,
                    entry.record.owner_service.as_str(),
                    entry.record.reason.as_str(),
                    entry.path
                )?;
            }
            Ok(())
        }
        BadFilesCommand::Delete { indices } => {
            let indices = indices
                .iter()
                .map(|&i| usize::try_from(i).wrap_err("index out of range"))
                .collect::<color_eyre::Result<Vec<_>>>()?;
            let removed = store.delete_bad_files(&indices)?;
            let mut out = io::stdout().lock();
            for entry in &removed {
                writeln!(out, "Deleted {}", entry.path)?;
            }
            Ok(())
        }
    }
}

fn run_stats(config: &Config, command: &StatsCommand) -> color_eyre::Result<()> {
    let store = open_store(config)?;
    match command {
        StatsCommand::Current => print_json(&store.current_stats()?.unwrap_or_default()),
        StatsCommand::History => print_json(&store.stats_history()?),
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> color_eyre::Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_line(line: &str) {
    let _ = writeln!(io::stdout().lock(), "{line}");
}

/// Prints the end-of-run summary table.
fn print_run_summary(report: &RunReport) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write_summary(&mut handle, report);

    if !report.walk_failures.is_empty() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err);
        let _ = writeln!(err, "Walk errors ({}):", report.walk_failures.len());
        for failure in &report.walk_failures {
            let _ = writeln!(err, "  {failure}");
        }
    }
}

fn write_summary(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    let stats: &StatsSnapshot = &report.stats;
    let title = if report.interrupted { "Scan Interrupted" } else { "Scan Summary" };

    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.len()))?;
    writeln!(out)?;
    let rows = [
        ("Files checked", stats.files_checked),
        ("Hash matches", stats.hash_matches),
        ("Hash mismatches", stats.hash_mismatches),
        ("Video files", stats.video_files),
        ("Audio files", stats.audio_files),
        ("Non-media files", stats.non_media_files),
        ("Unknown files", stats.unknown_files),
        ("Unknown deleted", stats.unknown_files_deleted),
        ("Sonarr submissions", stats.sonarr_submissions),
        ("Radarr submissions", stats.radarr_submissions),
        ("Lidarr submissions", stats.lidarr_submissions),
    ];
    for (label, value) in rows {
        writeln!(out, "  {label:<20} {value:>8}")?;
    }
    writeln!(out)?;
    writeln!(out, "Elapsed: {:.1}s", stats.elapsed().as_secs_f64())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Load configuration (file under MEDIACHECK_* environment)
    let config = Config::load(cli.config.as_deref())?;

    // 4. Initialize tracing; the guard flushes the log file on exit
    let _guard = init_tracing(cli.verbose, cli.no_color, &config.logging)?;

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Check => run_check(&config).await,
        Commands::Daemon { interval } => run_daemon(&config, *interval).await,
        Commands::BadFiles(command) => run_bad_files(&config, command),
        Commands::Stats(command) => run_stats(&config, command),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["mediacheck", "--config", "mc.toml", "daemon", "--interval", "60"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(Utf8Path::new("mc.toml")));
        assert!(matches!(cli.command, Commands::Daemon { interval: 60 }));

        let cli = Cli::try_parse_from(["mediacheck", "bad-files", "delete", "2", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::BadFiles(BadFilesCommand::Delete { ref indices }) if indices == &[2, 5]
        ));

        assert!(Cli::try_parse_from(["mediacheck", "bad-files", "delete", "0"]).is_err());
        assert!(Cli::try_parse_from(["mediacheck", "daemon", "--interval", "0"]).is_err());
    }

    #[test]
    fn test_summary_table() {
        let report = RunReport {
            stats: StatsSnapshot {
                files_checked: 12,
                hash_matches: 9,
                video_files: 3,
                sonarr_submissions: 1,
                elapsed_nanos: 2_500_000_000,
                ..StatsSnapshot::default()
            },
            walk_failures: Vec::new(),
            interrupted: false,
        };
        let mut out = Vec::new();
        write_summary(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("\nScan Summary\n============\n"));
        assert!(text.contains("  Files checked              12\n"));
        assert!(text.contains("  Sonarr submissions          1\n"));
        assert!(text.ends_with("Elapsed: 2.5s\n"));
    }
}
