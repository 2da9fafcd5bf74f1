//! CLI binary for pdf2tex.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2tex::{
    extract, inspect, ExtractionConfig, ExtractionProgressCallback, ProgressCallback, Sweep,
};
use std::io::{self, Write};
use std::path::PathBuf;
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

/// Terminal progress callback: one bar covering both sweeps (formula pass
/// first, then text), with per-page log lines.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Count of pages that errored out across both sweeps.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_run_start` (called before any pages are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once the page count is known.
    /// Each page is visited twice, once per sweep.
    fn activate_bar(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} passes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length((total_pages * 2) as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting extraction of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, sweep: Sweep, page: usize, _total: usize) {
        self.bar.set_message(format!("{sweep} page {}", page + 1));
    }

    fn on_page_complete(&self, sweep: Sweep, page: usize, total: usize, found: usize) {
        self.bar.println(format!(
            "  {} {:<7} page {:>3}/{:<3}  {}",
            green("✓"),
            sweep.to_string(),
            page + 1,
            total,
            dim(&format!("{found} results")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, sweep: Sweep, page: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<7} page {:>3}/{:<3}  {}",
            red("✗"),
            sweep.to_string(),
            page + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, formulas: usize, texts: usize) {
        let errors = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if errors == 0 {
            eprintln!(
                "{} {} formulas, {} text lines",
                green("✔"),
                bold(&formulas.to_string()),
                bold(&texts.to_string()),
            );
        } else {
            eprintln!(
                "{} {} formulas, {} text lines  ({} pages had errors)",
                cyan("⚠"),
                bold(&formulas.to_string()),
                bold(&texts.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (JSON + HTML report in ./pdf2tex_<name>_<timestamp>/)
  pdf2tex paper.pdf

  # Put the run directory somewhere specific
  pdf2tex paper.pdf --output-root ~/runs

  # Stricter text filtering, higher resolution
  pdf2tex --min-confidence 0.85 --dpi 400 scan.pdf

  # Different engine commands
  pdf2tex --formula-cmd my-latex-ocr --text-cmd tesseract paper.pdf

  # Structured JSON on stdout
  pdf2tex --json paper.pdf > results.json

  # Inspect PDF metadata only (no engines needed)
  pdf2tex --inspect-only paper.pdf

RECOGNITION ENGINES:
  Formula   pix2tex (default)    image → LaTeX markup, one result per region
  Text      tesseract (default)  image → scored lines; lines below
                                 --min-confidence are dropped

  Both engines are external commands resolved on PATH and probed once at
  startup. A missing engine degrades the run to the other engine; the run
  fails only when neither is available.

ENVIRONMENT VARIABLES:
  PDF2TEX_FORMULA_CMD     Override the formula engine command
  PDF2TEX_TEXT_CMD        Override the text engine command
  PDFIUM_LIB_PATH         Path to an existing libpdfium
"#;

/// Extract LaTeX formulas and text from PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tex",
    version,
    about = "Extract LaTeX formulas and text from PDF documents",
    long_about = "Rasterise each page of a PDF, enhance the image, and run two external \
recognition engines over it: a formula engine producing LaTeX and a text engine producing \
confidence-scored lines. Results are written as JSON plus an HTML report with MathJax \
rendering.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: String,

    /// Directory under which the run directory is created.
    #[arg(long, env = "PDF2TEX_OUTPUT_ROOT", default_value = ".")]
    output_root: PathBuf,

    /// Exact output directory (skips the timestamped run-directory naming).
    #[arg(short, long, env = "PDF2TEX_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2TEX_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Contrast enhancement factor applied before recognition.
    #[arg(long, env = "PDF2TEX_CONTRAST", default_value_t = 1.3)]
    contrast: f32,

    /// Sharpness enhancement factor applied before recognition.
    #[arg(long, env = "PDF2TEX_SHARPNESS", default_value_t = 1.2)]
    sharpness: f32,

    /// Minimum confidence for text lines (0.0–1.0).
    #[arg(long, env = "PDF2TEX_MIN_CONFIDENCE", default_value_t = 0.70)]
    min_confidence: f32,

    /// Formula engine command (resolved on PATH).
    #[arg(long, env = "PDF2TEX_FORMULA_CMD", default_value = "pix2tex")]
    formula_cmd: String,

    /// Text engine command (resolved on PATH).
    #[arg(long, env = "PDF2TEX_TEXT_CMD", default_value = "tesseract")]
    text_cmd: String,

    /// Per-region engine call timeout in seconds.
    #[arg(long, env = "PDF2TEX_REGION_TIMEOUT", default_value_t = 120)]
    region_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TEX_PASSWORD")]
    password: Option<String>,

    /// Do not persist the enhanced page images.
    #[arg(long, env = "PDF2TEX_NO_ENHANCED")]
    no_enhanced: bool,

    /// Output structured JSON (ExtractionOutput) on stdout.
    #[arg(long, env = "PDF2TEX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TEX_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TEX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = info.title {
                println!("Title:        {}", t);
            }
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    } else if !cli.quiet {
        for engine in &output.provenance.engines {
            if !engine.available {
                eprintln!(
                    "{} {} engine unavailable: {}",
                    cyan("⚠"),
                    engine.kind,
                    engine.detail.as_deref().unwrap_or("unknown"),
                );
            }
        }
        eprintln!(
            "{}  {} formulas, {} text lines in {}ms  →  {}",
            if output.diagnostics.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.formula_count,
            output.stats.text_count,
            output.stats.total_ms,
            bold(&output.provenance.output_dir.display().to_string()),
        );
        if output.stats.region_failures > 0 {
            eprintln!(
                "   {} region failures (see extraction_results.json)",
                red(&output.stats.region_failures.to_string()),
            );
        }
        let dropped = output.stats.dropped.total();
        if dropped > 0 {
            eprintln!("   {} lines dropped during screening", dim(&dropped.to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .contrast(cli.contrast)
        .sharpness(cli.sharpness)
        .min_confidence(cli.min_confidence)
        .region_timeout_secs(cli.region_timeout)
        .formula_command(&cli.formula_cmd)
        .text_command(&cli.text_cmd)
        .output_root(&cli.output_root)
        .persist_enhanced(!cli.no_enhanced);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
