//! CLI binary for orator-client.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig`,
//! submits one document, renders the job's progress and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use orator_client::config::{
    DEFAULT_BASE_URL, ENV_BASE_URL, ENV_MAX_ATTEMPTS, ENV_POLL_INTERVAL_MS,
    ENV_REQUEST_TIMEOUT_SECS,
};
use orator_client::{
    wait_for_terminal, ClientConfig, DocumentFile, HttpTransport, Job, JobPhase,
    SubmissionCoordinator,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Job progress bar using indicatif ─────────────────────────────────────────

/// Renders store snapshots: a spinner while uploading/queued, a percentage
/// bar while converting.
struct JobProgressBar {
    bar: ProgressBar,
}

impl JobProgressBar {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
    }

    fn render(&self, job: &Job) {
        match &job.phase {
            JobPhase::Idle => {}
            JobPhase::Uploading => {
                self.bar.set_prefix("Uploading");
                self.bar.set_message(job.original_name.clone());
            }
            JobPhase::Queued => {
                self.bar.set_prefix("Queued");
                self.bar.set_message("waiting for the service…");
            }
            JobPhase::Converting(p) => {
                if self.bar.prefix() != "Converting" {
                    self.activate_bar();
                }
                self.bar.set_position(u64::from(p.percent()));
                self.bar.set_message(format!("{}/{}", p.current, p.total));
            }
            JobPhase::Completed(_) => {
                self.bar.set_position(100);
                self.bar
                    .finish_with_message(format!("{} {}", green("✔"), job.original_name));
            }
            JobPhase::Failed(e) => {
                self.bar.abandon_with_message(format!("{} {}", red("✘"), e));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and print the result locators
  orator book.pdf

  # Convert and save the audio
  orator novel.epub -o novel.mp3

  # Another service, faster polling
  orator --base-url http://tts.internal:8000 --poll-interval-ms 1000 book.pdf

  # Final job as JSON
  orator --json book.pdf > job.json

ENVIRONMENT VARIABLES:
  API_BASE_URL                  Base route of the conversion service
  ORATOR_POLL_INTERVAL_MS       Delay between status checks
  ORATOR_MAX_ATTEMPTS           Status checks before giving up
  ORATOR_REQUEST_TIMEOUT_SECS   Per-request HTTP timeout
  RUST_LOG                      Log filter (overrides -v / -q)
"#;

/// Convert PDF and EPUB documents to speech with a remote conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "orator",
    version,
    about = "Convert PDF and EPUB documents to speech",
    long_about = "Upload a PDF or EPUB document to a text-to-speech conversion service, \
track the conversion job until it completes, and print or download the resulting audio.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or EPUB file to convert.
    input: PathBuf,

    /// Download the audio to this file.
    #[arg(short, long, env = "ORATOR_OUTPUT")]
    output: Option<PathBuf>,

    /// Base route of the conversion service.
    #[arg(long, env = ENV_BASE_URL, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Delay between status checks in milliseconds.
    #[arg(long, env = ENV_POLL_INTERVAL_MS, default_value_t = 5_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Status checks (successful or not) before giving up.
    #[arg(long, env = ENV_MAX_ATTEMPTS, default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = ENV_REQUEST_TIMEOUT_SECS, default_value_t = 30)]
    request_timeout: u64,

    /// Print the final job as JSON instead of the locators.
    #[arg(long, env = "ORATOR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ORATOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ORATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ORATOR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = ClientConfig::builder()
        .base_url(&cli.base_url)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_attempts(cli.max_attempts)
        .request_timeout_secs(cli.request_timeout)
        .build()
        .context("Invalid configuration")?;

    let transport = HttpTransport::new(&config).context("Failed to create HTTP client")?;
    let client = SubmissionCoordinator::new(config, Arc::new(transport.clone()));

    let subscription = if show_progress {
        let bar = JobProgressBar::new();
        Some(client.store().subscribe(move |job| bar.render(job)))
    } else {
        None
    };

    // ── Submit and wait ──────────────────────────────────────────────────
    let limit = client.config().max_file_size_bytes;
    let document = DocumentFile::from_path_with_limit(&cli.input, limit)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let job_id = client.submit(Some(document)).await?;
    let job = wait_for_terminal(client.store(), Some(&job_id))
        .await
        .context("Job tracking stopped before the job finished")?;

    if let Some(sub) = subscription {
        sub.unsubscribe();
    }

    if cli.json {
        let json =
            serde_json::to_string_pretty(&job.view()).context("Failed to serialise job")?;
        println!("{json}");
    }

    let result = match &job.phase {
        JobPhase::Completed(result) => result,
        JobPhase::Failed(e) => bail!("Job {}: {}", job_id, e),
        _ => bail!("Job {}: ended in unexpected status {}", job_id, job.status()),
    };

    if !cli.json && !cli.quiet {
        println!("{}  {}", bold("audio   "), result.audio_ref);
        println!("{}  {}", dim("download"), result.download_ref);
        println!("{}  {}", dim("segments"), result.segments_ref);
        println!("{}  {}", dim("document"), result.document_ref);
    }

    // ── Fetch audio ──────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let bytes = transport
            .fetch_to_file(&result.download_ref, output_path)
            .await
            .context("Failed to download audio")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} bytes  →  {}",
                green("✔"),
                bytes,
                bold(&output_path.display().to_string()),
            );
        }
    }

    Ok(())
}
