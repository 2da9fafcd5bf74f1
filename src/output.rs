//! Output types: recognition results, provenance, statistics.
//!
//! The central type is [`ExtractionOutput`], assembled exactly once at the
//! end of a run by [`ExtractionOutput::assemble`] and never mutated after.
//! All filtering (emptiness, confidence) happens in the engine adapters;
//! assembly is pure concatenation plus provenance stamping, so a reader can
//! trust that anything present in `results` already passed every gate.

use crate::error::RegionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What kind of content a [`RecognitionResult`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// LaTeX markup for mathematical notation.
    Formula,
    /// A plain-text span with an engine confidence.
    Text,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Formula => write!(f, "formula"),
            ContentKind::Text => write!(f, "text"),
        }
    }
}

/// One recognized content element.
///
/// Invariants, enforced by the adapters before a result is ever constructed:
/// `content` is non-empty and trimmed; `confidence` is `Some` exactly when
/// `kind == Text`, and then always `>= ExtractionConfig::min_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// 0-based page index the element was recognized on.
    pub page: usize,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Identifier of the engine that produced this element.
    pub method: String,
}

/// Per-engine availability and yield, recorded in provenance.
///
/// `available == false` with `results == 0` means "the engine was absent";
/// `available == true` with `results == 0` means "it ran and found nothing".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub kind: ContentKind,
    /// Engine identifier (also the `method` stamped on its results).
    pub method: String,
    pub available: bool,
    /// Why the engine is unavailable, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Number of results the engine contributed to the final set.
    pub results: usize,
}

/// Where a run's inputs and artifacts live, plus which engines produced what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// The source PDF. Never mutated by the pipeline.
    pub input: PathBuf,
    /// Directory holding the persisted enhanced pages, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_dir: Option<PathBuf>,
    /// The run's output directory (report, JSON records, enhanced pages).
    pub output_dir: PathBuf,
    pub engines: Vec<EngineStatus>,
}

/// Tally of candidate lines dropped during adapter screening.
///
/// Drops are deliberate and silent in the result set, but counted here so a
/// run summary can explain why an engine's yield looks low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTally {
    /// Empty or whitespace-only recognitions.
    pub empty: usize,
    /// Text lines whose confidence was below the acceptance threshold.
    pub low_confidence: usize,
    /// Text lines that carried no confidence at all.
    pub missing_confidence: usize,
}

impl DropTally {
    pub fn merge(&mut self, other: DropTally) {
        self.empty += other.empty;
        self.low_confidence += other.low_confidence;
        self.missing_confidence += other.missing_confidence;
    }

    pub fn total(&self) -> usize {
        self.empty + self.low_confidence + self.missing_confidence
    }
}

/// Aggregate statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Formulas in the final result set.
    pub formula_count: usize,
    /// Text spans in the final result set.
    pub text_count: usize,
    /// Candidate lines dropped during screening.
    pub dropped: DropTally,
    /// Recognition attempts that failed or timed out (see diagnostics).
    pub region_failures: usize,
    pub render_ms: u64,
    pub enhance_ms: u64,
    pub recognition_ms: u64,
    pub total_ms: u64,
}

/// The complete, ordered output of one extraction run.
///
/// `results` holds every formula (page-ascending) followed by every text
/// span (page-ascending) — stable, never interleaved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub results: Vec<RecognitionResult>,
    pub provenance: Provenance,
    pub stats: ExtractionStats,
    /// Non-fatal per-region failures encountered during the sweeps.
    pub diagnostics: Vec<RegionError>,
}

impl ExtractionOutput {
    /// Assemble the final output: formulas first, then texts.
    ///
    /// Both inputs must already be sorted page-ascending (the orchestrator
    /// sorts by `(page, region)` before calling this). No filtering happens
    /// here.
    pub fn assemble(
        formulas: Vec<RecognitionResult>,
        texts: Vec<RecognitionResult>,
        provenance: Provenance,
        stats: ExtractionStats,
        diagnostics: Vec<RegionError>,
    ) -> Self {
        let mut results = formulas;
        results.extend(texts);
        Self {
            results,
            provenance,
            stats,
            diagnostics,
        }
    }

    /// Iterate the formula results only.
    pub fn formulas(&self) -> impl Iterator<Item = &RecognitionResult> {
        self.results
            .iter()
            .filter(|r| r.kind == ContentKind::Formula)
    }

    /// Iterate the text results only.
    pub fn texts(&self) -> impl Iterator<Item = &RecognitionResult> {
        self.results.iter().filter(|r| r.kind == ContentKind::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(page: usize, content: &str) -> RecognitionResult {
        RecognitionResult {
            page,
            kind: ContentKind::Formula,
            content: content.into(),
            confidence: None,
            method: "pix2tex".into(),
        }
    }

    fn text(page: usize, content: &str, confidence: f32) -> RecognitionResult {
        RecognitionResult {
            page,
            kind: ContentKind::Text,
            content: content.into(),
            confidence: Some(confidence),
            method: "tesseract".into(),
        }
    }

    fn provenance() -> Provenance {
        Provenance {
            input: "doc.pdf".into(),
            enhanced_dir: None,
            output_dir: "out".into(),
            engines: vec![],
        }
    }

    #[test]
    fn assemble_keeps_formulas_before_texts() {
        let out = ExtractionOutput::assemble(
            vec![formula(0, "x^2"), formula(2, "y")],
            vec![text(0, "Hello", 0.9), text(1, "World", 0.8)],
            provenance(),
            ExtractionStats::default(),
            vec![],
        );
        let kinds: Vec<ContentKind> = out.results.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ContentKind::Formula,
                ContentKind::Formula,
                ContentKind::Text,
                ContentKind::Text
            ]
        );
        // Page order preserved within each kind, not globally interleaved.
        let pages: Vec<usize> = out.results.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![0, 2, 0, 1]);
    }

    #[test]
    fn result_serialises_with_type_field_and_optional_confidence() {
        let json = serde_json::to_value(formula(0, "e=mc^2")).unwrap();
        assert_eq!(json["type"], "formula");
        assert!(json.get("confidence").is_none());

        let json = serde_json::to_value(text(1, "hi", 0.75)).unwrap();
        assert_eq!(json["type"], "text");
        assert!((json["confidence"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn drop_tally_merge_and_total() {
        let mut a = DropTally {
            empty: 1,
            low_confidence: 2,
            missing_confidence: 0,
        };
        a.merge(DropTally {
            empty: 0,
            low_confidence: 1,
            missing_confidence: 3,
        });
        assert_eq!(a.total(), 7);
        assert_eq!(a.low_confidence, 3);
    }

    #[test]
    fn kind_iterators_partition_results() {
        let out = ExtractionOutput::assemble(
            vec![formula(0, "a")],
            vec![text(0, "b", 0.8), text(1, "c", 0.9)],
            provenance(),
            ExtractionStats::default(),
            vec![],
        );
        assert_eq!(out.formulas().count(), 1);
        assert_eq!(out.texts().count(), 2);
    }
}
