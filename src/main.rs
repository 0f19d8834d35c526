//! driveindex - Rate-limited indexer for remote folder trees.
//!
//! Usage:
//!   driveindex crawl <FOLDER>          Index a Google Drive folder
//!   driveindex crawl <FOLDER> --fixture tree.json
//!                                      Index an offline fixture
//!   driveindex show <SESSION>          Print a saved session
//!   driveindex --help                  Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use driveindex_core::{CrawlConfig, CrawlSession, DirectoryNode, ListingFailurePolicy, TreeSummary};
use driveindex_crawl::{
    CrawlHandle, Crawler, JsonSessionSink, ListingProvider, MemoryProvider, SessionSink,
    format_thousands,
};
use driveindex_gdrive::{GoogleDriveConnector, parse_folder_id};

#[derive(Parser)]
#[command(
    name = "driveindex",
    version,
    about = "Rate-limited indexer for remote folder trees",
    long_about = "driveindex walks a Google Drive folder tree without tripping the API quota \
                  and records every folder and file it finds.\n\n\
                  Press Ctrl-C during a crawl to stop gracefully and keep what was indexed."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a folder and save the session
    Crawl(CrawlArgs),

    /// Print a saved session
    Show {
        /// Session JSON written by `crawl --output`
        session: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// List files under each folder
        #[arg(short, long)]
        files: bool,
    },
}

#[derive(Args)]
struct CrawlArgs {
    /// Folder id or Drive folder URL
    folder: String,

    /// OAuth 2.0 access token with drive.readonly scope
    #[arg(short, long, env = "DRIVEINDEX_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Crawl a JSON fixture instead of Google Drive
    #[arg(long, conflicts_with = "token")]
    fixture: Option<PathBuf>,

    /// TOML file with crawl settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory listing workers
    #[arg(long)]
    directory_workers: Option<usize>,

    /// File size lookup workers
    #[arg(long)]
    size_workers: Option<usize>,

    /// Entries requested per page (1-1000)
    #[arg(long)]
    page_size: Option<u32>,

    /// What to do when a page fails with a non-quota error
    #[arg(long)]
    failure_policy: Option<PolicyArg>,

    /// Attempts per page with `--failure-policy retry`
    #[arg(long, default_value = "3")]
    retry_attempts: u32,

    /// First retry delay in milliseconds with `--failure-policy retry`
    #[arg(long, default_value = "1000")]
    retry_backoff_ms: u64,

    /// Skip separate lookups for files listed without a size
    #[arg(long)]
    no_size_lookup: bool,

    /// Write the session as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print statistics every N seconds, also rewriting `--output`
    #[arg(long)]
    report_interval: Option<u64>,

    /// Include in-flight folders in periodic reports
    #[arg(long)]
    threads: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Truncate,
    MarkPartial,
    Retry,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Crawl(args) => run_crawl(args).await?,
        Command::Show {
            session,
            depth,
            files,
        } => run_show(&session, depth, files)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Crawl a folder, reporting progress until it drains or Ctrl-C.
async fn run_crawl(args: CrawlArgs) -> Result<()> {
    let folder_id = parse_folder_id(&args.folder)
        .ok_or_else(|| eyre!("Not a folder id or Drive folder URL: {}", args.folder))?;
    let config = load_config(&args, &folder_id)?;

    let provider: Arc<dyn ListingProvider> = match (&args.fixture, &args.token) {
        (Some(fixture), _) => {
            let json = std::fs::read_to_string(fixture)
                .with_context(|| format!("Failed to read fixture {}", fixture.display()))?;
            Arc::new(MemoryProvider::from_json(&json).context("Invalid fixture")?)
        }
        (None, Some(token)) => {
            Arc::new(GoogleDriveConnector::new(token.as_str()).context("Failed to create HTTP client")?)
        }
        (None, None) => bail!("An access token is required (--token or DRIVEINDEX_ACCESS_TOKEN)"),
    };

    info!(url = %provider.folder_url(&folder_id), provider = provider.name(), "Indexing");

    let crawler = Crawler::new(provider, config).context("Invalid crawl configuration")?;
    let handle = crawler.handle();

    let sink = args.output.as_ref().map(JsonSessionSink::new);
    let period = Duration::from_secs(args.report_interval.unwrap_or(0).max(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    let run = crawler.run();
    tokio::pin!(run);

    let session = loop {
        tokio::select! {
            result = &mut run => break result.context("Crawl failed")?,
            signal = tokio::signal::ctrl_c(), if !handle.is_stopping() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Stopping, waiting for workers to unwind");
                handle.request_graceful_stop();
            }
            _ = ticker.tick(), if args.report_interval.is_some() => {
                if args.threads {
                    eprintln!("{}", handle.thread_report());
                }
                eprintln!("{}", handle.statistics_report());
                if let Some(sink) = &sink {
                    autosave(&handle, sink);
                }
            }
        }
    };

    if let Some(sink) = &sink {
        handle
            .trigger_session_snapshot(sink)
            .with_context(|| format!("Failed to save session to {}", sink.path().display()))?;
        info!(path = %sink.path().display(), "Saved session");
    }

    print_summary(&session);
    println!();
    println!("{}", handle.statistics_report());

    Ok(())
}

/// Write a mid-crawl snapshot; failures are logged and the crawl goes on.
fn autosave(handle: &CrawlHandle, sink: &dyn SessionSink) -> bool {
    match handle.trigger_session_snapshot(sink) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Autosave failed");
            false
        }
    }
}

/// Merge the config file, the folder id and command-line overrides.
fn load_config(args: &CrawlArgs, folder_id: &str) -> Result<CrawlConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let mut table: toml::Table = text
                .parse()
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            table.insert("root".to_string(), toml::Value::String(folder_id.to_string()));
            toml::Value::Table(table)
                .try_into::<CrawlConfig>()
                .with_context(|| format!("Invalid crawl settings in {}", path.display()))?
        }
        None => CrawlConfig::new(folder_id),
    };

    if let Some(workers) = args.directory_workers {
        config.directory_workers = workers;
    }
    if let Some(workers) = args.size_workers {
        config.size_workers = workers;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = match policy {
            PolicyArg::Truncate => ListingFailurePolicy::Truncate,
            PolicyArg::MarkPartial => ListingFailurePolicy::MarkPartial,
            PolicyArg::Retry => ListingFailurePolicy::Retry {
                max_attempts: args.retry_attempts,
                backoff_ms: args.retry_backoff_ms,
            },
        };
    }
    if args.no_size_lookup {
        config.resolve_unknown_sizes = false;
    }

    config.validate()?;
    Ok(config)
}

/// Print a saved session as a tree.
fn run_show(path: &Path, max_depth: u32, show_files: bool) -> Result<()> {
    let session = JsonSessionSink::load(path).context("Failed to load session")?;

    print_summary(&session);
    println!();
    print_node(&session.root, 0, max_depth, show_files);

    Ok(())
}

fn print_summary(session: &CrawlSession) {
    let summary = session.summary();

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", session.root.name, format_size(summary.total_bytes));
    println!(" {}", session.root_url);
    println!(
        " {} files, {} folders",
        format_thousands(summary.files),
        format_thousands(summary.directories)
    );
    if summary.unknown_sizes > 0 {
        println!(" {} files without a known size", format_thousands(summary.unknown_sizes));
    }
    println!(
        " {:?} in {:.2}s",
        session.outcome,
        session.duration.as_secs_f64()
    );
    println!("{}", "─".repeat(60));

    if summary.pending_directories > 0 {
        println!(
            "{} folder(s) not indexed before the crawl stopped",
            summary.pending_directories
        );
    }
    if summary.partial_directories > 0 {
        println!("{} folder(s) partially indexed", summary.partial_directories);
    }
    if session.has_warnings() {
        println!("{} warning(s) during crawl", session.warnings.len());
    }
}

/// Print a folder and its subfolders.
fn print_node(node: &DirectoryNode, depth: u32, max_depth: u32, show_files: bool) {
    let indent = "  ".repeat(depth as usize);
    let summary = TreeSummary::of(node);
    let marker = if node.status.is_finished() { "▼" } else { "?" };

    println!(
        "{}{} {:<40} {:>10} {:>8} files",
        indent,
        marker,
        truncate(&format!("{}/", node.name), 40),
        format_size(summary.total_bytes),
        format_thousands(summary.files)
    );

    if depth >= max_depth {
        return;
    }

    for child in &node.children {
        print_node(child, depth + 1, max_depth, show_files);
    }

    if show_files {
        let indent = "  ".repeat((depth + 1) as usize);
        for file in &node.files {
            let size = file.size.map(format_size).unwrap_or_else(|| "?".to_string());
            println!("{}  {:<40} {:>10}", indent, truncate(&file.file_name, 40), size);
        }
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use driveindex_core::CrawlOutcome;
    use driveindex_crawl::RemoteEntry;
    use tempfile::TempDir;

    #[tokio::test(start_paused = true)]
    async fn test_autosave_writes_running_snapshot() {
        let provider = MemoryProvider::new()
            .with_folder("root", "Root", vec![RemoteEntry::folder("a", "A")])
            .with_folder("a", "A", vec![RemoteEntry::file("f", "f.txt", Some(9))])
            .with_latency(Duration::from_secs(1));
        let crawler = Crawler::new(Arc::new(provider), CrawlConfig::new("root")).unwrap();
        let handle = crawler.handle();
        let run = tokio::spawn(crawler.run());

        let temp = TempDir::new().unwrap();
        let sink = JsonSessionSink::new(temp.path().join("autosave.json"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(autosave(&handle, &sink));
        let partial = JsonSessionSink::load(sink.path()).unwrap();
        assert_eq!(partial.outcome, CrawlOutcome::Running);
        assert_eq!(partial.stats.directories, 1);

        run.await.unwrap().unwrap();
        assert!(autosave(&handle, &sink));
        let finished = JsonSessionSink::load(sink.path()).unwrap();
        assert_eq!(finished.outcome, CrawlOutcome::Completed);
        assert_eq!(finished.stats.files, 1);
    }

    #[test]
    fn test_autosave_failure_is_not_fatal() {
        let crawler = Crawler::new(Arc::new(MemoryProvider::new()), CrawlConfig::new("root")).unwrap();
        let temp = TempDir::new().unwrap();
        let sink = JsonSessionSink::new(temp.path().join("missing").join("autosave.json"));

        assert!(!autosave(&crawler.handle(), &sink));
    }
}
