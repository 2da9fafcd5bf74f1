//! The recognition engine boundary.
//!
//! Split in two layers:
//!
//! * [`backend`] — the raw capability: a [`backend::RecognitionBackend`]
//!   turns an image file into one of a few tolerated raw shapes. The
//!   bundled [`backend::CommandBackend`] drives an external OCR program.
//! * [`adapter`] — the pipeline-facing wrapper: availability decided once
//!   at construction, per-region failure isolation, shape normalization,
//!   and confidence screening.
//!
//! The orchestrator only ever talks to adapters; backends are what callers
//! plug in (or what the config probes for them).

pub mod adapter;
pub mod backend;

pub use adapter::{Capability, EngineAdapter, RegionOutcome, SkipReason};
pub use backend::{BackendError, CommandBackend, RawLine, RawRecognition, RecognitionBackend};
