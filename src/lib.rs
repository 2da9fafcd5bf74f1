//! # pdf2tex
//!
//! Extract LaTeX formulas and plain text from PDF documents using a pair of
//! external recognition engines.
//!
//! ## Why this crate?
//!
//! Embedded-text extraction (pdftotext, pdf-extract) cannot read scanned
//! documents at all, and even on digital PDFs it mangles mathematics —
//! superscripts, fractions, and operators come out as noise. Instead this
//! crate rasterises each page, enhances the image for recognition, and runs
//! two specialised engines over it: a formula engine that emits LaTeX and a
//! text engine that emits scored lines. Both kinds of result land in one
//! page-ordered output.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file, check the %PDF magic
//!  ├─ 2. Probe    check both engines once; abort only if neither works
//!  ├─ 3. Render   rasterise pages at 300 DPI via pdfium (spawn_blocking)
//!  ├─ 4. Enhance  contrast 1.3x, sharpness 1.2x; persist enhanced PNGs
//!  ├─ 5. Sweep    formula pass over candidate regions, text pass per page
//!  ├─ 6. Screen   clean markup, drop empty and low-confidence lines
//!  └─ 7. Output   page-ordered results + JSON + MathJax HTML report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tex::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Engines default to `pix2tex` and `tesseract` on PATH.
//!     let config = ExtractionConfig::default();
//!     let output = extract("paper.pdf", &config).await?;
//!     for formula in output.formulas() {
//!         println!("page {}: {}", formula.page + 1, formula.content);
//!     }
//!     eprintln!("{} formulas, {} text lines",
//!         output.stats.formula_count,
//!         output.stats.text_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Degraded mode
//!
//! A missing engine is not fatal: the run continues with whichever engine is
//! present, and `output.provenance.engines` records which one was skipped
//! and why. Only when *both* engines are unavailable does [`extract`] fail,
//! before writing any artifact.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tex` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2tex = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use engine::{
    BackendError, Capability, CommandBackend, EngineAdapter, RawLine, RawRecognition,
    RecognitionBackend,
};
pub use error::{ExtractError, RegionError};
pub use extract::{extract, extract_sync, inspect};
pub use output::{
    ContentKind, DropTally, EngineStatus, ExtractionOutput, ExtractionStats, Provenance,
    RecognitionResult,
};
pub use pipeline::enhance::EnhancedPage;
pub use pipeline::regions::{Region, RegionProposer, WholePageProposer};
pub use pipeline::render::DocumentInfo;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Sweep};
