//! Configuration types for formula/text extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across threads and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::engine::RecognitionBackend;
use crate::error::ExtractError;
use crate::pipeline::regions::RegionProposer;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2tex::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .min_confidence(0.8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–600. Default: 300.
    ///
    /// Formula OCR benefits from denser renders than plain text does:
    /// subscripts and thin fraction bars disappear below ~200 DPI. 300 is a
    /// good balance of stroke fidelity against render time and memory.
    pub dpi: u32,

    /// Contrast enhancement factor. 1.0 = unchanged. Default: 1.3.
    pub contrast: f32,

    /// Sharpness enhancement factor. 1.0 = unchanged. Default: 1.2.
    pub sharpness: f32,

    /// Acceptance threshold for text confidences, in [0, 1]. Default: 0.70.
    ///
    /// Text lines below this never enter the result set. Formula results
    /// are not confidence-gated — formula engines rarely report a usable
    /// score, and a wrong formula is obvious to a human reviewer in a way
    /// low-quality OCR text is not.
    pub min_confidence: f32,

    /// Per-region recognition timeout in seconds. Default: 120.
    ///
    /// One pathological region (a full-page bitmap scan, a vector-art
    /// explosion) must not stall the whole document. A timed-out region is
    /// recorded as a diagnostic and the sweep moves on.
    pub region_timeout_secs: u64,

    /// Program used for formula recognition, invoked per region. Default: "pix2tex".
    ///
    /// Probed once at startup; a missing program degrades the run rather
    /// than failing it (as long as the text engine is present).
    pub formula_command: String,

    /// Program used for text recognition, invoked per page. Default: "tesseract".
    pub text_command: String,

    /// Pre-constructed formula backend. Takes precedence over `formula_command`.
    pub formula_backend: Option<Arc<dyn RecognitionBackend>>,

    /// Pre-constructed text backend. Takes precedence over `text_command`.
    pub text_backend: Option<Arc<dyn RecognitionBackend>>,

    /// Region candidate policy. Default: whole page as the sole candidate.
    pub region_proposer: Option<Arc<dyn RegionProposer>>,

    /// Directory under which the per-run output directory is created. Default: ".".
    pub output_root: PathBuf,

    /// Explicit run output directory, overriding the timestamped default.
    pub output_dir: Option<PathBuf>,

    /// Persist enhanced pages as PNGs under `<run>/enhanced/`. Default: true.
    pub persist_enhanced: bool,

    /// Write `extraction_results.json` and `report.html`. Default: true.
    ///
    /// Library callers that only want the in-memory
    /// [`crate::output::ExtractionOutput`] can switch this off.
    pub write_report: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            contrast: 1.3,
            sharpness: 1.2,
            min_confidence: 0.70,
            region_timeout_secs: 120,
            formula_command: "pix2tex".to_string(),
            text_command: "tesseract".to_string(),
            formula_backend: None,
            text_backend: None,
            region_proposer: None,
            output_root: PathBuf::from("."),
            output_dir: None,
            persist_enhanced: true,
            write_report: true,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("contrast", &self.contrast)
            .field("sharpness", &self.sharpness)
            .field("min_confidence", &self.min_confidence)
            .field("region_timeout_secs", &self.region_timeout_secs)
            .field("formula_command", &self.formula_command)
            .field("text_command", &self.text_command)
            .field(
                "formula_backend",
                &self.formula_backend.as_ref().map(|b| b.name().to_string()),
            )
            .field(
                "text_backend",
                &self.text_backend.as_ref().map(|b| b.name().to_string()),
            )
            .field(
                "region_proposer",
                &self.region_proposer.as_ref().map(|_| "<dyn RegionProposer>"),
            )
            .field("output_root", &self.output_root)
            .field("output_dir", &self.output_dir)
            .field("persist_enhanced", &self.persist_enhanced)
            .field("write_report", &self.write_report)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn contrast(mut self, factor: f32) -> Self {
        self.config.contrast = factor.max(0.0);
        self
    }

    pub fn sharpness(mut self, factor: f32) -> Self {
        self.config.sharpness = factor.max(0.0);
        self
    }

    pub fn min_confidence(mut self, threshold: f32) -> Self {
        self.config.min_confidence = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn region_timeout_secs(mut self, secs: u64) -> Self {
        self.config.region_timeout_secs = secs.max(1);
        self
    }

    pub fn formula_command(mut self, program: impl Into<String>) -> Self {
        self.config.formula_command = program.into();
        self
    }

    pub fn text_command(mut self, program: impl Into<String>) -> Self {
        self.config.text_command = program.into();
        self
    }

    pub fn formula_backend(mut self, backend: Arc<dyn RecognitionBackend>) -> Self {
        self.config.formula_backend = Some(backend);
        self
    }

    pub fn text_backend(mut self, backend: Arc<dyn RecognitionBackend>) -> Self {
        self.config.text_backend = Some(backend);
        self
    }

    pub fn region_proposer(mut self, proposer: Arc<dyn RegionProposer>) -> Self {
        self.config.region_proposer = Some(proposer);
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn persist_enhanced(mut self, v: bool) -> Self {
        self.config.persist_enhanced = v;
        self
    }

    pub fn write_report(mut self, v: bool) -> Self {
        self.config.write_report = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if !(0.0..=1.0).contains(&c.min_confidence) {
            return Err(ExtractError::InvalidConfig(format!(
                "min_confidence must be in [0, 1], got {}",
                c.min_confidence
            )));
        }
        if c.formula_command.is_empty() && c.formula_backend.is_none() {
            return Err(ExtractError::InvalidConfig(
                "formula engine: set formula_command or formula_backend".into(),
            ));
        }
        if c.text_command.is_empty() && c.text_backend.is_none() {
            return Err(ExtractError::InvalidConfig(
                "text engine: set text_command or text_backend".into(),
            ));
        }
        Ok(self.config)
    }
}
