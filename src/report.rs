//! Report artifacts written into the run directory.
//!
//! Two files per run: `extraction_results.json` with the full structured
//! output, and `report.html`, a self-contained page that renders recognized
//! formulas through MathJax and previews the text results.

use crate::error::ExtractError;
use crate::output::ExtractionOutput;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

const MATHJAX_SRC: &str = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js";

/// How many text lines the HTML report previews.
const TEXT_PREVIEW_LIMIT: usize = 10;

/// Write `extraction_results.json` into the run directory.
pub fn write_results_json(
    output_dir: &Path,
    output: &ExtractionOutput,
) -> Result<PathBuf, ExtractError> {
    let path = output_dir.join("extraction_results.json");
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ExtractError::Internal(format!("Failed to serialize results: {e}")))?;
    std::fs::write(&path, json).map_err(|e| ExtractError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Write `report.html` into the run directory.
pub fn write_html_report(
    output_dir: &Path,
    output: &ExtractionOutput,
) -> Result<PathBuf, ExtractError> {
    let path = output_dir.join("report.html");
    std::fs::write(&path, render_html(output)).map_err(|e| ExtractError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

fn render_html(output: &ExtractionOutput) -> String {
    let mut html = String::with_capacity(4096);
    let doc = output
        .provenance
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.provenance.input.display().to_string());

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <title>Extraction report: {doc}</title>\n\
         <script id=\"MathJax-script\" async src=\"{MATHJAX_SRC}\"></script>\n\
         <style>\n\
         body {{ font-family: sans-serif; margin: 2em auto; max-width: 60em; }}\n\
         code {{ background: #f4f4f4; padding: 0.1em 0.3em; }}\n\
         table {{ border-collapse: collapse; }}\n\
         td, th {{ border: 1px solid #ccc; padding: 0.3em 0.6em; text-align: left; }}\n\
         .unavailable {{ color: #a00; }}\n\
         </style>\n</head>\n<body>\n",
        doc = escape(&doc),
    );

    let _ = write!(html, "<h1>Extraction report: {}</h1>\n", escape(&doc));
    let _ = write!(
        html,
        "<p>{} pages, {} formulas, {} text lines, {} region failures, {}ms.</p>\n",
        output.stats.total_pages,
        output.stats.formula_count,
        output.stats.text_count,
        output.stats.region_failures,
        output.stats.total_ms,
    );

    html.push_str("<h2>Engines</h2>\n<table>\n<tr><th>Engine</th><th>Method</th><th>Status</th><th>Results</th></tr>\n");
    for engine in &output.provenance.engines {
        let status = if engine.available {
            "available".to_string()
        } else {
            format!(
                "<span class=\"unavailable\">unavailable: {}</span>",
                escape(engine.detail.as_deref().unwrap_or("unknown"))
            )
        };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            engine.kind,
            escape(&engine.method),
            status,
            engine.results,
        );
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Formulas</h2>\n");
    let mut any_formula = false;
    for result in output.formulas() {
        any_formula = true;
        // Raw markup first, then the same markup wrapped for MathJax.
        let _ = write!(
            html,
            "<p>Page {}: <code>{}</code></p>\n<p>\\({}\\)</p>\n",
            result.page + 1,
            escape(&result.content),
            escape(&result.content),
        );
    }
    if !any_formula {
        html.push_str("<p>No formulas recognized.</p>\n");
    }

    let _ = write!(
        html,
        "<h2>Text (first {TEXT_PREVIEW_LIMIT} lines)</h2>\n"
    );
    let mut any_text = false;
    for result in output.texts().take(TEXT_PREVIEW_LIMIT) {
        any_text = true;
        let confidence = result
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = write!(
            html,
            "<p>Page {} (confidence {}): {}</p>\n",
            result.page + 1,
            confidence,
            escape(&result.content),
        );
    }
    if !any_text {
        html.push_str("<p>No text recognized.</p>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Minimal HTML escaping for text interpolated into the report.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
