//! Top-level extraction entry points and the recognition orchestrator.
//!
//! ## Order of operations
//!
//! Engine availability is decided *before* the run directory exists: if
//! neither engine can start, nothing useful can be produced and the run
//! aborts without leaving artifacts behind. Rendering and enhancement come
//! next and are fatal on failure (a missing page would shift every
//! downstream index). Only then do the two sweeps run, and from that point
//! on nothing is fatal — every engine failure is a per-region diagnostic.
//!
//! ## Two sweeps, not one
//!
//! Formula and text recognition are logically independent passes. The
//! formula sweep walks the proposed candidate regions of each page; the
//! text sweep always reads the whole page. Keeping them separate means one
//! engine's availability, failures, and pacing never affect the other's.

use crate::config::ExtractionConfig;
use crate::engine::{Capability, CommandBackend, EngineAdapter};
use crate::error::{ExtractError, RegionError};
use crate::output::{
    DropTally, EngineStatus, ExtractionOutput, ExtractionStats, Provenance, RecognitionResult,
};
use crate::pipeline::regions::{RegionProposer, WholePageProposer};
use crate::pipeline::{enhance, input, render};
use crate::progress::Sweep;
use crate::report;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract formulas and text from a PDF file.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even when one engine was unavailable
/// or individual regions failed (check `output.provenance.engines` and
/// `output.diagnostics`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal conditions: missing or
/// corrupt input, both engines unavailable, a page that cannot be rendered
/// or enhanced, or an output artifact that cannot be written.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf_path = input::resolve_input(input_str)?;

    // ── Step 2: Construct engine adapters (probe once) ───────────────────
    let formula = resolve_formula_adapter(config);
    let text = resolve_text_adapter(config);

    if !formula.is_available() && !text.is_available() {
        // Fail fast: with zero engines the sweeps cannot produce anything,
        // so abort before any output artifact exists.
        return Err(ExtractError::NoEngineAvailable {
            formula_reason: formula.unavailable_reason().unwrap_or("unknown").to_string(),
            text_reason: text.unavailable_reason().unwrap_or("unknown").to_string(),
        });
    }
    if let Some(reason) = formula.unavailable_reason() {
        warn!("running degraded: formula engine unavailable ({reason})");
    }
    if let Some(reason) = text.unavailable_reason() {
        warn!("running degraded: text engine unavailable ({reason})");
    }

    // ── Step 3: Create the run output directory ──────────────────────────
    let output_dir = create_run_dir(config, &pdf_path)?;
    info!("Run output directory: {}", output_dir.display());

    // ── Step 4: Document info ────────────────────────────────────────────
    let doc_info = render::document_info(&pdf_path, config.password.as_deref()).await?;
    let total_pages = doc_info.page_count;
    info!("PDF has {} pages", total_pages);

    // ── Step 5: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config.dpi, config.password.as_deref()).await?;
    let render_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_ms);

    // ── Step 6: Enhance pages (and persist the enhanced document) ────────
    let enhance_start = Instant::now();
    let enhanced_dir = if config.persist_enhanced {
        let dir = output_dir.join("enhanced");
        std::fs::create_dir_all(&dir).map_err(|e| ExtractError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
        Some(dir)
    } else {
        None
    };
    let pages = enhance_pages(rendered, config, enhanced_dir.as_deref()).await?;
    let enhance_ms = enhance_start.elapsed().as_millis() as u64;
    info!("Enhanced {} pages in {}ms", pages.len(), enhance_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(pages.len());
    }

    // ── Step 7: Recognition sweeps ───────────────────────────────────────
    let recognition_start = Instant::now();

    let formula = Arc::new(formula);
    let text = Arc::new(text);
    let proposer: Arc<dyn RegionProposer> = config
        .region_proposer
        .clone()
        .unwrap_or_else(|| Arc::new(WholePageProposer));
    let whole_page: Arc<dyn RegionProposer> = Arc::new(WholePageProposer);

    let formula_sweep = run_sweep(&formula, Sweep::Formula, &pages, &proposer, config).await;
    // The text pass always reads the whole page at native resolution,
    // independent of the formula candidate policy.
    let text_sweep = run_sweep(&text, Sweep::Text, &pages, &whole_page, config).await;

    let recognition_ms = recognition_start.elapsed().as_millis() as u64;

    // ── Step 8: Aggregate ────────────────────────────────────────────────
    let mut dropped = DropTally::default();
    dropped.merge(formula_sweep.dropped);
    dropped.merge(text_sweep.dropped);

    let mut diagnostics = formula_sweep.diagnostics;
    diagnostics.extend(text_sweep.diagnostics);

    let stats = ExtractionStats {
        total_pages,
        formula_count: formula_sweep.results.len(),
        text_count: text_sweep.results.len(),
        dropped,
        region_failures: diagnostics.len(),
        render_ms,
        enhance_ms,
        recognition_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };

    let provenance = Provenance {
        input: pdf_path,
        enhanced_dir,
        output_dir: output_dir.clone(),
        engines: vec![
            engine_status(&formula, formula_sweep.results.len()),
            engine_status(&text, text_sweep.results.len()),
        ],
    };

    let output = ExtractionOutput::assemble(
        formula_sweep.results,
        text_sweep.results,
        provenance,
        stats,
        diagnostics,
    );

    // ── Step 9: Emit report artifacts ────────────────────────────────────
    if config.write_report {
        let json_path = report::write_results_json(&output_dir, &output)?;
        let html_path = report::write_html_report(&output_dir, &output)?;
        info!(
            "Wrote {} and {}",
            json_path.display(),
            html_path.display()
        );
    }

    info!(
        "Extraction complete: {} formulas, {} texts, {}ms total",
        output.stats.formula_count, output.stats.text_count, output.stats.total_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(output.stats.formula_count, output.stats.text_count);
    }

    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract(input_str, config))
}

/// Read document info without recognizing anything.
///
/// Does not require any recognition engine to be installed.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<render::DocumentInfo, ExtractError> {
    let pdf_path = input::resolve_input(input_str.as_ref())?;
    render::document_info(&pdf_path, None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_formula_adapter(config: &ExtractionConfig) -> EngineAdapter {
    match &config.formula_backend {
        Some(backend) => EngineAdapter::formula(
            backend.name().to_string(),
            Capability::from_backend(Arc::clone(backend)),
        ),
        None => EngineAdapter::formula(
            config.formula_command.clone(),
            Capability::probe_command(
                CommandBackend::formula(&config.formula_command)
                    .with_timeout(Duration::from_secs(config.region_timeout_secs)),
            ),
        ),
    }
}

fn resolve_text_adapter(config: &ExtractionConfig) -> EngineAdapter {
    match &config.text_backend {
        Some(backend) => EngineAdapter::text(
            backend.name().to_string(),
            Capability::from_backend(Arc::clone(backend)),
            config.min_confidence,
        ),
        None => EngineAdapter::text(
            config.text_command.clone(),
            Capability::probe_command(
                CommandBackend::text(&config.text_command)
                    .with_timeout(Duration::from_secs(config.region_timeout_secs)),
            ),
            config.min_confidence,
        ),
    }
}

fn engine_status(adapter: &EngineAdapter, results: usize) -> EngineStatus {
    EngineStatus {
        kind: adapter.kind(),
        method: adapter.method().to_string(),
        available: adapter.is_available(),
        detail: adapter.unavailable_reason().map(|s| s.to_string()),
        results,
    }
}

/// Create a fresh, uniquely named run directory.
///
/// `pdf2tex_<stem>_<timestamp>` under `output_root`, with a numeric suffix
/// if two runs land in the same second.
fn create_run_dir(config: &ExtractionConfig, pdf_path: &Path) -> Result<PathBuf, ExtractError> {
    if let Some(ref dir) = config.output_dir {
        std::fs::create_dir_all(dir).map_err(|e| ExtractError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
        return Ok(dir.clone());
    }

    let stem = input::document_stem(pdf_path);
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base = config
        .output_root
        .join(format!("pdf2tex_{stem}_{timestamp}"));

    for attempt in 0..100 {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            base.with_file_name(format!(
                "{}-{attempt}",
                base.file_name().unwrap_or_default().to_string_lossy()
            ))
        };
        match std::fs::create_dir_all(&candidate) {
            Ok(()) if std::fs::read_dir(&candidate).map(|mut d| d.next().is_none()).unwrap_or(false) => {
                return Ok(candidate);
            }
            Ok(()) => continue,
            Err(e) => {
                return Err(ExtractError::OutputWriteFailed {
                    path: candidate,
                    source: e,
                })
            }
        }
    }

    Err(ExtractError::Internal(
        "could not find a fresh run directory name".into(),
    ))
}

/// Enhance every rendered page, persisting when a directory is given.
async fn enhance_pages(
    rendered: Vec<render::RenderedPage>,
    config: &ExtractionConfig,
    enhanced_dir: Option<&Path>,
) -> Result<Vec<enhance::EnhancedPage>, ExtractError> {
    let contrast = config.contrast;
    let sharpness = config.sharpness;
    let dir = enhanced_dir.map(|d| d.to_path_buf());

    // Enhancement is pure CPU work over every pixel of every page.
    tokio::task::spawn_blocking(move || {
        let mut pages = Vec::with_capacity(rendered.len());
        for page in rendered {
            let enhanced = enhance::EnhancedPage {
                index: page.index,
                width_pts: page.width_pts,
                height_pts: page.height_pts,
                image: enhance::enhance_image(&page.image, contrast, sharpness),
            };
            if let Some(ref dir) = dir {
                enhance::persist_page(&enhanced, dir)?;
            }
            debug!("Enhanced page {}", enhanced.index);
            pages.push(enhanced);
        }
        Ok(pages)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Enhance task panicked: {e}")))?
}

/// Everything one sweep produced.
struct SweepOutcome {
    /// Results in final order (page-ascending, region-ascending).
    results: Vec<RecognitionResult>,
    dropped: DropTally,
    diagnostics: Vec<RegionError>,
}

/// Walk every page (and each of its candidate regions) through one adapter.
///
/// Engine calls run on the blocking pool under the per-region timeout.
/// Command backends kill their engine process at the same deadline; the
/// timer here is the backstop for injected backends, which cannot be
/// killed, only abandoned. Nothing in here is fatal: failures and
/// timeouts become diagnostics and the walk continues. Results are collected keyed by `(page, region)` and
/// sorted before returning, so the final order is deterministic even if a
/// future executor runs regions out of order.
async fn run_sweep(
    adapter: &Arc<EngineAdapter>,
    sweep: Sweep,
    pages: &[enhance::EnhancedPage],
    proposer: &Arc<dyn RegionProposer>,
    config: &ExtractionConfig,
) -> SweepOutcome {
    let mut outcome = SweepOutcome {
        results: Vec::new(),
        dropped: DropTally::default(),
        diagnostics: Vec::new(),
    };

    if !adapter.is_available() {
        debug!("{sweep} sweep skipped: engine unavailable");
        return outcome;
    }

    let timeout = Duration::from_secs(config.region_timeout_secs);
    let total_pages = pages.len();
    let mut keyed: Vec<((usize, usize), RecognitionResult)> = Vec::new();

    for page in pages {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(sweep, page.index, total_pages);
        }
        let mut page_found = 0usize;
        let mut page_error: Option<String> = None;

        for region in proposer.propose(page) {
            let (page_idx, region_idx) = (region.page, region.index);
            let adapter_call = Arc::clone(adapter);
            let call =
                tokio::task::spawn_blocking(move || adapter_call.recognize(&region));

            let region_outcome = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(region_outcome)) => region_outcome,
                Ok(Err(join_err)) => {
                    let err = RegionError::EngineFailed {
                        page: page_idx,
                        region: region_idx,
                        method: adapter.method().to_string(),
                        detail: format!("recognition task panicked: {join_err}"),
                    };
                    warn!("{err}");
                    page_error = Some(err.to_string());
                    outcome.diagnostics.push(err);
                    continue;
                }
                Err(_elapsed) => {
                    let err = RegionError::Timeout {
                        page: page_idx,
                        region: region_idx,
                        method: adapter.method().to_string(),
                        secs: config.region_timeout_secs,
                    };
                    warn!("{err}");
                    page_error = Some(err.to_string());
                    outcome.diagnostics.push(err);
                    continue;
                }
            };

            outcome.dropped.merge(region_outcome.dropped);
            if let Some(err) = region_outcome.failure {
                page_error = Some(err.to_string());
                outcome.diagnostics.push(err);
            }
            page_found += region_outcome.results.len();
            keyed.extend(
                region_outcome
                    .results
                    .into_iter()
                    .map(|r| ((page_idx, region_idx), r)),
            );
        }

        if let Some(ref cb) = config.progress_callback {
            match page_error {
                Some(err) if page_found == 0 => {
                    cb.on_page_error(sweep, page.index, total_pages, &err)
                }
                _ => cb.on_page_complete(sweep, page.index, total_pages, page_found),
            }
        }
        debug!("{sweep} sweep page {}: {} results", page.index, page_found);
    }

    keyed.sort_by_key(|(key, _)| *key);
    outcome.results = keyed.into_iter().map(|(_, r)| r).collect();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BackendError, RawLine, RawRecognition, RecognitionBackend};
    use crate::output::ContentKind;
    use crate::pipeline::regions::Region;
    use image::{DynamicImage, RgbImage};
    use std::sync::Mutex;

    fn page(index: usize) -> enhance::EnhancedPage {
        enhance::EnhancedPage {
            index,
            width_pts: 612.0,
            height_pts: 792.0,
            image: DynamicImage::ImageRgb8(RgbImage::new(6, 6)),
        }
    }

    /// Answers from a fixed per-call script, in call order.
    struct ScriptedBackend {
        name: &'static str,
        script: Mutex<Vec<Result<RawRecognition, BackendError>>>,
    }

    impl ScriptedBackend {
        fn new(
            name: &'static str,
            mut script: Vec<Result<RawRecognition, BackendError>>,
        ) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                name,
                script: Mutex::new(script),
            })
        }
    }

    impl RecognitionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn recognize(&self, _image: &Path) -> Result<RawRecognition, BackendError> {
            self.script.lock().unwrap().pop().expect("script exhausted")
        }
    }

    fn formula_adapter(script: Vec<Result<RawRecognition, BackendError>>) -> Arc<EngineAdapter> {
        Arc::new(EngineAdapter::formula(
            "mock-formula",
            Capability::from_backend(ScriptedBackend::new("mock-formula", script)),
        ))
    }

    fn whole_page() -> Arc<dyn RegionProposer> {
        Arc::new(WholePageProposer)
    }

    #[tokio::test]
    async fn sweep_collects_results_in_page_order() {
        let adapter = formula_adapter(vec![
            Ok(RawRecognition::Content("a = b".into())),
            Ok(RawRecognition::Content(String::new())),
            Ok(RawRecognition::Content("c = d".into())),
        ]);
        let pages = vec![page(0), page(1), page(2)];
        let config = ExtractionConfig::default();

        let out = run_sweep(&adapter, Sweep::Formula, &pages, &whole_page(), &config).await;
        let found: Vec<(usize, &str)> = out
            .results
            .iter()
            .map(|r| (r.page, r.content.as_str()))
            .collect();
        assert_eq!(found, vec![(0, "a = b"), (2, "c = d")]);
        assert_eq!(out.dropped.empty, 1);
        assert!(out.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn failing_unit_does_not_stop_later_pages() {
        // Page 1's engine call explodes; pages 0 and 2 still contribute.
        let adapter = formula_adapter(vec![
            Ok(RawRecognition::Content("first".into())),
            Err(BackendError::Failed {
                program: "mock".into(),
                status: "exit status: 1".into(),
                stderr: "boom".into(),
            }),
            Ok(RawRecognition::Content("third".into())),
        ]);
        let pages = vec![page(0), page(1), page(2)];
        let config = ExtractionConfig::default();

        let out = run_sweep(&adapter, Sweep::Formula, &pages, &whole_page(), &config).await;
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].page, 0);
        assert_eq!(out.results[1].page, 2);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].page(), 1);
    }

    #[tokio::test]
    async fn unavailable_adapter_skips_sweep_entirely() {
        let adapter = Arc::new(EngineAdapter::formula(
            "pix2tex",
            Capability::Unavailable {
                reason: "not installed".into(),
            },
        ));
        let pages = vec![page(0)];
        let config = ExtractionConfig::default();

        let out = run_sweep(&adapter, Sweep::Formula, &pages, &whole_page(), &config).await;
        assert!(out.results.is_empty());
        assert!(out.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn multi_region_proposer_is_walked_fully() {
        struct SplitProposer;
        impl RegionProposer for SplitProposer {
            fn propose(&self, page: &enhance::EnhancedPage) -> Vec<Region> {
                (0..3)
                    .map(|i| Region {
                        page: page.index,
                        index: i,
                        image: page.image.clone(),
                    })
                    .collect()
            }
        }

        let adapter = formula_adapter(vec![
            Ok(RawRecognition::Content("r0".into())),
            Ok(RawRecognition::Content("r1".into())),
            Ok(RawRecognition::Content("r2".into())),
        ]);
        let pages = vec![page(0)];
        let config = ExtractionConfig::default();
        let proposer: Arc<dyn RegionProposer> = Arc::new(SplitProposer);

        let out = run_sweep(&adapter, Sweep::Formula, &pages, &proposer, &config).await;
        let contents: Vec<&str> = out.results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["r0", "r1", "r2"]);
    }

    #[tokio::test]
    async fn text_sweep_filters_and_scores() {
        let backend = ScriptedBackend::new(
            "mock-text",
            vec![Ok(RawRecognition::Lines(vec![
                RawLine {
                    content: "Hello".into(),
                    confidence: Some(0.95),
                },
                RawLine {
                    content: "World".into(),
                    confidence: Some(0.5),
                },
            ]))],
        );
        let adapter = Arc::new(EngineAdapter::text(
            "mock-text",
            Capability::from_backend(backend),
            0.70,
        ));
        let pages = vec![page(0)];
        let config = ExtractionConfig::default();

        let out = run_sweep(&adapter, Sweep::Text, &pages, &whole_page(), &config).await;
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].kind, ContentKind::Text);
        assert_eq!(out.results[0].confidence, Some(0.95));
        assert_eq!(out.dropped.low_confidence, 1);
    }

    #[test]
    fn run_dir_uses_explicit_override() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("explicit");
        let config = ExtractionConfig::builder()
            .output_dir(&dir)
            .build()
            .unwrap();
        let created = create_run_dir(&config, Path::new("doc.pdf")).unwrap();
        assert_eq!(created, dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn run_dir_is_fresh_and_named_after_document() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder()
            .output_root(tmp.path())
            .build()
            .unwrap();
        let a = create_run_dir(&config, Path::new("paper.pdf")).unwrap();
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pdf2tex_paper_"));
        // A second run in the same second must not reuse a non-empty dir.
        std::fs::write(a.join("marker"), b"x").unwrap();
        let b = create_run_dir(&config, Path::new("paper.pdf")).unwrap();
        assert_ne!(a, b);
    }
}
