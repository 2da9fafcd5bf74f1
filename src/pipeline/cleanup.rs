//! Deterministic cleanup of raw engine output.
//!
//! OCR engines decorate their answers with artefacts that are correct from
//! the engine's perspective but wrong for downstream consumers:
//!
//! - LaTeX OCR tools wrap markup in `$$…$$`, `\[…\]`, or `$…$` delimiters,
//!   or prefix the line with the image filename or a `latex:` label
//! - text engines emit stray control characters, zero-width spaces, and
//!   Windows line endings
//!
//! This module applies cheap, ordered regex/string rules that strip those
//! artefacts without touching content. Each rule is a pure `&str → String`
//! pass and independently testable. Rule order matters: the filename prefix
//! must go before delimiter stripping so `fig1.png: $$x$$` unwraps fully,
//! and whitespace collapsing runs last so earlier rules can leave gaps.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean recognized LaTeX markup.
///
/// Rules (applied in order):
/// 1. Strip a leading `<image-file>:` prefix some CLIs echo back
/// 2. Strip a leading `latex:` label
/// 3. Unwrap outer math delimiters (`$$…$$`, `\[…\]`, `$…$`)
/// 4. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Collapse all whitespace runs to single spaces and trim
pub fn clean_formula(input: &str) -> String {
    let s = strip_filename_prefix(input);
    let s = strip_latex_label(&s);
    let s = unwrap_math_delimiters(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

/// Clean a recognized text span: drop invisible Unicode and collapse
/// whitespace runs.
pub fn clean_text(input: &str) -> String {
    let s = remove_invisible_chars(input);
    collapse_whitespace(&s)
}

// ── Rule 1: strip an echoed image-filename prefix ────────────────────────

static RE_FILENAME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\S+\.(?:png|jpe?g|tiff?|bmp):\s*").unwrap());

fn strip_filename_prefix(input: &str) -> String {
    RE_FILENAME_PREFIX.replace(input.trim(), "").to_string()
}

// ── Rule 2: strip a `latex:` label ───────────────────────────────────────

static RE_LATEX_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^latex:\s*").unwrap());

fn strip_latex_label(input: &str) -> String {
    RE_LATEX_LABEL.replace(input, "").to_string()
}

// ── Rule 3: unwrap outer math delimiters ─────────────────────────────────

static RE_DISPLAY_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(?:\$\$(.*)\$\$|\\\[(.*)\\\]|\$(.*)\$)\s*$").unwrap());

fn unwrap_math_delimiters(input: &str) -> String {
    if let Some(caps) = RE_DISPLAY_MATH.captures(input) {
        for group in 1..=3 {
            if let Some(inner) = caps.get(group) {
                return inner.as_str().to_string();
            }
        }
    }
    input.to_string()
}

// ── Rule 4: remove invisible Unicode ─────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' | '\u{00ad}'))
        .collect()
}

// ── Rule 5: collapse whitespace ──────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}
