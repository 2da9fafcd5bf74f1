//! Pipeline stages for formula and text extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. a learned region detector) without touching the
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ enhance ──▶ regions ──▶ engines ──▶ cleanup
//! (path)   (pdfium)   (contrast/   (candidate  (formula +  (markup
//!                      sharpness)   surfaces)   text OCR)   hygiene)
//! ```
//!
//! 1. [`input`]   — validate the PDF path and `%PDF` magic up front
//! 2. [`render`]  — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`enhance`] — deterministic contrast/sharpness adjustment per page
//! 4. [`regions`] — propose candidate regions (whole page by default)
//! 5. [`cleanup`] — strip delimiter/prefix artefacts from engine output
//!    (invoked by the engine adapters, not by the orchestrator directly)

pub mod cleanup;
pub mod enhance;
pub mod input;
pub mod regions;
pub mod render;
