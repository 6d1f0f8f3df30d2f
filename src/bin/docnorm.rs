//! CLI binary for edgequake-docnorm.
//!
//! A thin shim over the library crate: reads the input files, maps CLI flags
//! to `NormalizeConfig`, and writes the canonical PDFs plus a manifest.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docnorm::{
    collect_with_config, write_outputs, BatchStats, BatchTimestamp, NormalizeConfig,
    NormalizeProgressCallback, ProgressCallback, SourceFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback. The bar starts at the number of top-level
/// files and grows as archives and emails reveal their members.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix("Normalising");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl NormalizeProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Normalising {total_files} files…"))
        ));
    }

    fn on_file_start(&self, ordinal: &str, name: &str) {
        // Top-level files are already counted by on_batch_start.
        if ordinal.contains('.') {
            self.bar.inc_length(1);
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, ordinal: &str, name: &str, outputs: usize) {
        let detail = if outputs == 0 {
            "expanded".to_string()
        } else {
            format!("{outputs} pdf")
        };
        self.bar.println(format!(
            "  {} {:<8} {:<40} {}",
            green("✓"),
            ordinal,
            name,
            dim(&detail)
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, ordinal: &str, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<8} {:<40} {}",
            red("✗"),
            ordinal,
            name,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, stats: &BatchStats) {
        self.bar.finish_and_clear();
        let produced = stats.passthrough + stats.converted;
        let skipped = self.errors.load(Ordering::SeqCst);

        if stats.failed == 0 {
            eprintln!(
                "{} {} pdfs from {} files",
                green("✔"),
                bold(&produced.to_string()),
                stats.dispatched
            );
        } else {
            eprintln!(
                "{} {} pdfs from {} files  ({} skipped, {} failed)",
                cyan("⚠"),
                bold(&produced.to_string()),
                stats.dispatched,
                skipped,
                red(&stats.failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Normalise an email and write PDFs to ./out
  docnorm message --out-dir out

  # Several files, pinned receive time (controls output names)
  docnorm invoice.docx scans.zip photo.jpg --out-dir out \
      --received-at 2024-05-17T09:41:03Z

  # One office process at a time, custom binary
  docnorm *.xlsx --out-dir out --office-command /opt/libreoffice/program/soffice \
      --office-concurrency 1

  # JSON summary on stdout
  docnorm bundle.rar --out-dir out --json

SUPPORTED INPUTS (extension match is case-sensitive):
  .pdf                                    passed through unchanged
  .doc .docx .xls .xlsx .csv .txt         converted with the office command
  .jpg .jpeg .png .bmp .tiff .tif         wrapped into a one-page PDF
  .zip .rar                               extracted, members normalised
  (no extension)                          parsed as a raw email, attachments normalised

ENVIRONMENT VARIABLES:
  DOCNORM_OUT_DIR             Output directory
  DOCNORM_RECEIVED_AT         Batch receive time
  DOCNORM_OFFICE_COMMAND      Office converter executable (default: soffice)
  DOCNORM_ARCHIVE_COMMAND     rar extractor executable (default: 7z)
  RUST_LOG                    Override log filter (e.g. edgequake_docnorm=debug)
"#;

/// Normalise invoice attachments into canonical PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "docnorm",
    version,
    about = "Normalise PDFs, office files, images, archives and emails into canonical PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files. Files without an extension are treated as raw emails.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory for the canonical PDFs and manifest.json.
    #[arg(short, long, env = "DOCNORM_OUT_DIR")]
    out_dir: PathBuf,

    /// Batch receive time (e.g. 2024-05-17T09:41:03Z). Default: now.
    #[arg(long, env = "DOCNORM_RECEIVED_AT")]
    received_at: Option<String>,

    /// Office converter executable.
    #[arg(long, env = "DOCNORM_OFFICE_COMMAND", default_value = "soffice")]
    office_command: String,

    /// Maximum concurrent office conversions (default: unbounded).
    #[arg(long, env = "DOCNORM_OFFICE_CONCURRENCY")]
    office_concurrency: Option<usize>,

    /// Extraction tool for rar archives.
    #[arg(long, env = "DOCNORM_ARCHIVE_COMMAND", default_value = "7z")]
    archive_command: String,

    /// Argument template for the extraction tool.
    #[arg(long, env = "DOCNORM_ARCHIVE_ARGS", default_value = "x -y -o{outdir} {archive}")]
    archive_args: String,

    /// Images at most this many pixels on both edges are rejected.
    #[arg(long, env = "DOCNORM_MIN_IMAGE_DIMENSION", default_value_t = 300)]
    min_image_dimension: u32,

    /// Maximum container nesting depth.
    #[arg(long, env = "DOCNORM_MAX_DEPTH", default_value_t = 8)]
    max_depth: usize,

    /// Print the batch result (names, sources, stats) as JSON on stdout.
    #[arg(long, env = "DOCNORM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCNORM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCNORM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCNORM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Inputs ───────────────────────────────────────────────────────────
    let timestamp = match cli.received_at {
        Some(ref at) => BatchTimestamp::parse(at).context("Invalid --received-at")?,
        None => BatchTimestamp::now(),
    };

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        files.push(read_source(path).await?);
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn NormalizeProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run batch ────────────────────────────────────────────────────────
    let output = collect_with_config(files, timestamp, &config).await;
    let manifest = write_outputs(&output.pdfs, &cli.out_dir)
        .await
        .context("Failed to write outputs")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            let stats = &output.stats;
            eprintln!(
                "Produced {} pdfs from {} files in {}ms ({} dropped, {} rejected, {} failed)",
                output.pdfs.len(),
                stats.dispatched,
                stats.duration_ms,
                stats.dropped,
                stats.rejected,
                stats.failed
            );
        }
        eprintln!(
            "   {}  →  {}",
            dim(&format!("{}ms", output.stats.duration_ms)),
            bold(&manifest.display().to_string())
        );
    }

    Ok(())
}

/// Read one input file. The name is the file's base name so that the
/// extension drives routing.
async fn read_source(path: &Path) -> Result<SourceFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {:?}", path))?;
    Ok(SourceFile::new(name, bytes))
}

/// Map CLI args to `NormalizeConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<NormalizeConfig> {
    let mut builder = NormalizeConfig::builder()
        .office_command(cli.office_command.clone())
        .archive_command(cli.archive_command.clone())
        .archive_args(&cli.archive_args)
        .min_image_dimension(cli.min_image_dimension)
        .max_depth(cli.max_depth);

    if let Some(n) = cli.office_concurrency {
        builder = builder.office_concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
