//! Error types for the pdf2tex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot proceed at all
//!   (missing input, corrupt PDF, no recognition engine available).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`RegionError`] — **Non-fatal**: one recognition attempt failed (the
//!   engine crashed, timed out, or produced output nobody can interpret) but
//!   every other region and page is fine. Recorded in
//!   [`crate::output::ExtractionOutput::diagnostics`] so callers can audit
//!   partial success rather than losing the whole document to one bad region.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! region failure, log and continue, or collect all diagnostics for a report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2tex library.
///
/// Per-region failures use [`RegionError`] and are stored in
/// [`crate::output::ExtractionOutput::diagnostics`] rather than propagated
/// here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium returned an error while rasterising a specific page.
    ///
    /// Fatal by design: a page missing from the enhanced document would shift
    /// every downstream page index.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Contrast/sharpness enhancement or enhanced-page persistence failed.
    #[error("Enhancement failed for page {page}: {detail}")]
    EnhancementFailed { page: usize, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Neither the formula engine nor the text engine could be initialised.
    ///
    /// With zero engines the sweep cannot produce anything, so the run aborts
    /// before creating any output artifact.
    #[error(
        "No recognition engine is available.\n\
         formula: {formula_reason}\n\
         text: {text_reason}\n\
         Install one of the configured engines or supply a backend via the config."
    )]
    NoEngineAvailable {
        formula_reason: String,
        text_reason: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a run output artifact.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure for a single recognition attempt.
///
/// Stored in [`crate::output::ExtractionOutput::diagnostics`]. The sweep
/// continues with the next region or page regardless.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RegionError {
    /// The recognition engine returned an error for this region.
    #[error("Page {page} region {region}: {method} failed: {detail}")]
    EngineFailed {
        page: usize,
        region: usize,
        method: String,
        detail: String,
    },

    /// The recognition call exceeded the per-region timeout.
    #[error("Page {page} region {region}: {method} timed out after {secs}s")]
    Timeout {
        page: usize,
        region: usize,
        method: String,
        secs: u64,
    },

    /// The engine answered, but in a shape the adapter cannot interpret.
    #[error("Page {page} region {region}: {method} returned an uninterpretable result: {detail}")]
    UnrecognizedOutput {
        page: usize,
        region: usize,
        method: String,
        detail: String,
    },
}

impl RegionError {
    /// The page this diagnostic refers to (0-based).
    pub fn page(&self) -> usize {
        match self {
            RegionError::EngineFailed { page, .. }
            | RegionError::Timeout { page, .. }
            | RegionError::UnrecognizedOutput { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_engine_display_names_both_reasons() {
        let e = ExtractError::NoEngineAvailable {
            formula_reason: "pix2tex not found".into(),
            text_reason: "tesseract not found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pix2tex not found"), "got: {msg}");
        assert!(msg.contains("tesseract not found"), "got: {msg}");
    }

    #[test]
    fn rasterisation_display() {
        let e = ExtractError::RasterisationFailed {
            page: 3,
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }

    #[test]
    fn region_error_page_accessor() {
        let e = RegionError::Timeout {
            page: 7,
            region: 0,
            method: "tesseract".into(),
            secs: 120,
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn region_error_round_trips_through_json() {
        let e = RegionError::EngineFailed {
            page: 1,
            region: 2,
            method: "pix2tex".into(),
            detail: "exit status 1".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: RegionError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page(), 1);
    }
}
