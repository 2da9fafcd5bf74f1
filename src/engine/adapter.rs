//! Engine adapters: one per content type, wrapping a pluggable capability.
//!
//! An adapter owns three responsibilities the rest of the pipeline must
//! never worry about:
//!
//! 1. **Availability** — the capability is probed exactly once, at
//!    construction, into a [`Capability`]. Construction never fails; an
//!    engine that cannot start yields `Capability::Unavailable` with a
//!    recorded reason, and `recognize` on an unavailable adapter returns
//!    "no results" rather than an error.
//! 2. **Isolation** — any backend failure for one region is caught and
//!    converted into a diagnostic. Nothing an engine does to one region can
//!    abort the sweep.
//! 3. **Normalization** — whatever raw shape the backend answers with is
//!    screened line-by-line into canonical [`RecognitionResult`]s. Every
//!    rejected line has an explicit [`SkipReason`], tallied in the outcome
//!    so drops are auditable.

use crate::engine::backend::{
    BackendError, CommandBackend, RawLine, RawRecognition, RecognitionBackend,
};
use crate::error::RegionError;
use crate::output::{ContentKind, DropTally, RecognitionResult};
use crate::pipeline::cleanup;
use crate::pipeline::regions::Region;
use std::sync::Arc;
use tracing::{debug, warn};

/// An engine's availability, decided once and carried as data.
#[derive(Clone)]
pub enum Capability {
    Available(Arc<dyn RecognitionBackend>),
    Unavailable { reason: String },
}

impl Capability {
    /// Wrap a caller-supplied backend; always available.
    pub fn from_backend(backend: Arc<dyn RecognitionBackend>) -> Self {
        Capability::Available(backend)
    }

    /// Probe an external command once; failure becomes `Unavailable`.
    pub fn probe_command(backend: CommandBackend) -> Self {
        match backend.probe() {
            Ok(()) => Capability::Available(Arc::new(backend)),
            Err(reason) => {
                warn!("engine unavailable: {reason}");
                Capability::Unavailable { reason }
            }
        }
    }
}

/// Why a candidate line was not turned into a result.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Empty or whitespace-only after cleanup.
    Empty,
    /// A text line without any confidence value.
    MissingConfidence,
    /// A text line below the acceptance threshold.
    LowConfidence { confidence: f32, threshold: f32 },
}

/// Everything one recognition attempt produced.
#[derive(Default)]
pub struct RegionOutcome {
    /// Canonical results that passed every gate.
    pub results: Vec<RecognitionResult>,
    /// Lines deliberately dropped during screening.
    pub dropped: DropTally,
    /// The per-region failure, when the attempt produced none of the above.
    pub failure: Option<RegionError>,
}

/// One recognition engine, normalized to a stable interface.
pub struct EngineAdapter {
    kind: ContentKind,
    /// Engine identifier used for provenance and the `method` result field,
    /// meaningful even when the capability is unavailable.
    method: String,
    capability: Capability,
    /// Acceptance threshold; `Some` only for the text adapter.
    min_confidence: Option<f32>,
}

impl EngineAdapter {
    /// The formula adapter. Engine-reported confidences are discarded;
    /// formula results never carry one.
    pub fn formula(method: impl Into<String>, capability: Capability) -> Self {
        Self {
            kind: ContentKind::Formula,
            method: method.into(),
            capability,
            min_confidence: None,
        }
    }

    /// The text adapter. Lines below `min_confidence` (or without any
    /// confidence at all) are dropped here, before the orchestrator ever
    /// sees them.
    pub fn text(method: impl Into<String>, capability: Capability, min_confidence: f32) -> Self {
        Self {
            kind: ContentKind::Text,
            method: method.into(),
            capability,
            min_confidence: Some(min_confidence),
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_available(&self) -> bool {
        matches!(self.capability, Capability::Available(_))
    }

    /// Why the engine is unavailable, when it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.capability {
            Capability::Available(_) => None,
            Capability::Unavailable { reason } => Some(reason),
        }
    }

    /// Run the engine over one region.
    ///
    /// Unavailable engines answer immediately with an empty outcome. The
    /// region image is materialised as a PNG temp file named by page and
    /// region index (collision-free under concurrency) and deleted when this
    /// call returns, on success and failure alike.
    pub fn recognize(&self, region: &Region) -> RegionOutcome {
        let backend = match &self.capability {
            Capability::Available(b) => b,
            Capability::Unavailable { .. } => return RegionOutcome::default(),
        };

        let temp = match tempfile::Builder::new()
            .prefix(&format!("region-p{}-r{}-", region.page, region.index))
            .suffix(".png")
            .tempfile()
        {
            Ok(t) => t,
            Err(e) => {
                return RegionOutcome {
                    failure: Some(RegionError::EngineFailed {
                        page: region.page,
                        region: region.index,
                        method: self.method.clone(),
                        detail: format!("could not create temp image: {e}"),
                    }),
                    ..Default::default()
                }
            }
        };

        if let Err(e) = region
            .image
            .save_with_format(temp.path(), image::ImageFormat::Png)
        {
            return RegionOutcome {
                failure: Some(RegionError::EngineFailed {
                    page: region.page,
                    region: region.index,
                    method: self.method.clone(),
                    detail: format!("could not write temp image: {e}"),
                }),
                ..Default::default()
            };
        }

        // `temp` drops at the end of this frame, deleting the file on every
        // exit path below.
        let raw = match backend.recognize(temp.path()) {
            Ok(raw) => raw,
            Err(BackendError::UnrecognizedOutput { detail }) => {
                warn!(
                    "page {} region {}: {} answered in an unknown shape: {detail}",
                    region.page, region.index, self.method
                );
                return RegionOutcome {
                    failure: Some(RegionError::UnrecognizedOutput {
                        page: region.page,
                        region: region.index,
                        method: self.method.clone(),
                        detail,
                    }),
                    ..Default::default()
                };
            }
            Err(BackendError::TimedOut { secs, .. }) => {
                warn!(
                    "page {} region {}: {} killed after {secs}s",
                    region.page, region.index, self.method
                );
                return RegionOutcome {
                    failure: Some(RegionError::Timeout {
                        page: region.page,
                        region: region.index,
                        method: self.method.clone(),
                        secs,
                    }),
                    ..Default::default()
                };
            }
            Err(e) => {
                warn!(
                    "page {} region {}: {} failed: {e}",
                    region.page, region.index, self.method
                );
                return RegionOutcome {
                    failure: Some(RegionError::EngineFailed {
                        page: region.page,
                        region: region.index,
                        method: self.method.clone(),
                        detail: e.to_string(),
                    }),
                    ..Default::default()
                };
            }
        };

        self.screen(region.page, raw)
    }

    /// Screen raw engine output into canonical results plus a drop tally.
    fn screen(&self, page: usize, raw: RawRecognition) -> RegionOutcome {
        let lines: Vec<RawLine> = match raw {
            RawRecognition::Content(content) => vec![RawLine {
                content,
                confidence: None,
            }],
            RawRecognition::Scored(content, confidence) => vec![RawLine {
                content,
                confidence: Some(confidence),
            }],
            RawRecognition::Lines(lines) => lines,
        };

        let mut outcome = RegionOutcome::default();
        for line in lines {
            match self.screen_line(line) {
                Ok((content, confidence)) => outcome.results.push(RecognitionResult {
                    page,
                    kind: self.kind,
                    content,
                    confidence,
                    method: self.method.clone(),
                }),
                Err(SkipReason::Empty) => outcome.dropped.empty += 1,
                Err(SkipReason::MissingConfidence) => outcome.dropped.missing_confidence += 1,
                Err(SkipReason::LowConfidence {
                    confidence,
                    threshold,
                }) => {
                    debug!(
                        "page {page}: dropped line at confidence {confidence:.2} < {threshold:.2}"
                    );
                    outcome.dropped.low_confidence += 1;
                }
            }
        }
        outcome
    }

    /// One line through the gates: cleanup, emptiness, confidence.
    fn screen_line(&self, line: RawLine) -> Result<(String, Option<f32>), SkipReason> {
        let content = match self.kind {
            ContentKind::Formula => cleanup::clean_formula(&line.content),
            ContentKind::Text => cleanup::clean_text(&line.content),
        };
        if content.is_empty() {
            return Err(SkipReason::Empty);
        }

        match self.min_confidence {
            // Formula adapter: any engine-reported confidence is discarded.
            None => Ok((content, None)),
            Some(threshold) => {
                let confidence = line
                    .confidence
                    .ok_or(SkipReason::MissingConfidence)?
                    .clamp(0.0, 1.0);
                if confidence < threshold {
                    Err(SkipReason::LowConfidence {
                        confidence,
                        threshold,
                    })
                } else {
                    Ok((content, Some(confidence)))
                }
            }
        }
    }
}
