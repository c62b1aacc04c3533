//! Context-Scraper main entry point
//!
//! This is the command-line trigger for the documentation crawler.

use anyhow::Context;
use clap::Parser;
use context_scraper::config::{load_config_with_hash, Config};
use context_scraper::output::OutputLayout;
use context_scraper::trigger::{resolve_project_name, run_scrape, ScrapeRequest, ScrapeResponse};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Context-Scraper: documentation crawler for AI training corpora
///
/// Crawls a documentation site breadth-first from START_URL, extracts the
/// main content of each page, splits it into token-bounded chunks and
/// writes JSON records, chunk files and an optional PDF per page.
#[derive(Parser, Debug)]
#[command(name = "context-scraper")]
#[command(version = "1.0.0")]
#[command(about = "Documentation crawler for AI training corpora", long_about = None)]
struct Cli {
    /// Where the crawl begins
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Output directory name (defaults to the first label of the host)
    #[arg(short, long)]
    project: Option<String>,

    /// Also render one PDF per page
    #[arg(long)]
    pdf: bool,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Override `output.root`
    #[arg(long, value_name = "DIR")]
    output_root: Option<PathBuf>,

    /// Override `crawler.max-pages`
    #[arg(long)]
    max_pages: Option<u64>,

    /// Override `crawler.concurrency`
    #[arg(long)]
    concurrency: Option<u32>,

    /// Print the response as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one scrape; returns whether the run succeeded
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = build_config(&cli)?;

    let request = ScrapeRequest {
        start_url: cli.start_url.clone(),
        project_name: cli.project.clone(),
        pdf_export: cli.pdf,
    };
    let project_name = resolve_project_name(&request)?;

    let layout = OutputLayout::new(Path::new(&config.output.root), &project_name);
    let log_path = setup_logging(cli.verbose, cli.quiet, &layout.logs_dir())?;
    tracing::info!(
        start_url = %request.start_url,
        project = %project_name,
        log_file = %log_path.display(),
        "Starting scrape"
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let response = run_scrape(request, config, cancel).await;
    report(&response, cli.json, cli.quiet)?;
    Ok(response.is_success())
}

/// Loads the configuration file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            eprintln!("Configuration loaded from {} (hash: {})", path.display(), hash);
            config
        }
        None => Config::default(),
    };

    if let Some(root) = &cli.output_root {
        config.output.root = root.to_string_lossy().into_owned();
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }

    context_scraper::config::validate(&config)?;
    Ok(config)
}

/// Sets up console and per-run file logging
///
/// `RUST_LOG` overrides the verbosity flags for both outputs.
fn setup_logging(verbose: u8, quiet: bool, logs_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("creating log directory {}", logs_dir.display()))?;
    let log_path = logs_dir.join(format!(
        "scraper_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    let log_file = File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("context_scraper=info,warn"),
                1 => EnvFilter::new("context_scraper=debug,info"),
                2 => EnvFilter::new("context_scraper=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("context_scraper=debug,info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(file_filter),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(log_path)
}

/// Cancels the crawl on the first Ctrl-C
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            cancel.cancel();
        }
    });
}

fn report(response: &ScrapeResponse, json: bool, quiet: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    match response {
        ScrapeResponse::Success { data } => {
            if quiet {
                return Ok(());
            }
            println!("=== Scrape Complete ===");
            println!("  Pages processed: {}", data.pages_processed);
            println!("  Total tokens:    {}", data.total_tokens);
            println!("  Duration:        {:.2}s", data.duration_seconds);
            println!("  Output:          {}", data.output_directory);
            if !data.failed_urls.is_empty() {
                println!("  Failed URLs ({}):", data.failed_urls.len());
                for url in &data.failed_urls {
                    println!("    - {}", url);
                }
            }
        }
        ScrapeResponse::Error { message } => {
            eprintln!("Scrape failed: {}", message);
        }
    }
    Ok(())
}
