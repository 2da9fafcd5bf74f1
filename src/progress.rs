//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the two recognition sweeps walk the document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a log, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` so it stays correct if a future executor runs
//! pages concurrently. All events are informational only — nothing a
//! callback does can change pipeline control flow.

use std::fmt;
use std::sync::Arc;

/// Which recognition sweep an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Formula,
    Text,
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sweep::Formula => write!(f, "formula"),
            Sweep::Text => write!(f, "text"),
        }
    }
}

/// Called by the pipeline as it processes each page of each sweep.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after rendering, before the first sweep.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is submitted to an engine.
    fn on_page_start(&self, sweep: Sweep, page: usize, total_pages: usize) {
        let _ = (sweep, page, total_pages);
    }

    /// Called when a page finished a sweep; `found` counts the results it
    /// contributed after filtering.
    fn on_page_complete(&self, sweep: Sweep, page: usize, total_pages: usize, found: usize) {
        let _ = (sweep, page, total_pages, found);
    }

    /// Called when a page's recognition attempt failed (the sweep continues).
    fn on_page_error(&self, sweep: Sweep, page: usize, total_pages: usize, error: &str) {
        let _ = (sweep, page, total_pages, error);
    }

    /// Called once after both sweeps, with the final counts.
    fn on_run_complete(&self, formulas: usize, texts: usize) {
        let _ = (formulas, texts);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _sweep: Sweep, _page: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _sweep: Sweep, _page: usize, _total: usize, _found: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _sweep: Sweep, _page: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_page_start(Sweep::Formula, 0, 3);
        cb.on_page_complete(Sweep::Formula, 0, 3, 1);
        cb.on_page_error(Sweep::Text, 1, 3, "engine died");
        cb.on_run_complete(1, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        cb.on_page_start(Sweep::Formula, 0, 2);
        cb.on_page_complete(Sweep::Formula, 0, 2, 1);
        cb.on_page_start(Sweep::Text, 0, 2);
        cb.on_page_error(Sweep::Text, 0, 2, "timeout");
        assert_eq!(cb.starts.load(Ordering::SeqCst), 2);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sweep_display() {
        assert_eq!(Sweep::Formula.to_string(), "formula");
        assert_eq!(Sweep::Text.to_string(), "text");
    }
}
