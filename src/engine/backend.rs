//! The recognition capability boundary.
//!
//! A [`RecognitionBackend`] is anything that can look at an image file and
//! answer with recognized content. Concrete engines live outside this crate
//! (external OCR programs, test mocks); the pipeline only ever sees the
//! trait and the small set of raw shapes defined here.
//!
//! ## Why a sum type for raw output?
//!
//! Real OCR tools do not agree on an output contract. A LaTeX OCR prints a
//! bare markup string, another emits a `[content, confidence]` pair, and
//! text engines produce per-line collections with scores. Rather than
//! letting each caller guess, [`RawRecognition`] names the accepted shapes
//! once; anything else is a [`BackendError::UnrecognizedOutput`] that the
//! adapter turns into a diagnostic instead of a crash.

use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// One line of raw engine output, optionally scored.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub content: String,
    pub confidence: Option<f32>,
}

/// The shapes a recognition engine is allowed to answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecognition {
    /// A bare content string with no score.
    Content(String),
    /// A `(content, confidence)` pair.
    Scored(String, f32),
    /// A per-line collection, each line optionally scored.
    Lines(Vec<RawLine>),
}

/// Errors a backend may surface for a single recognition call.
///
/// These never abort the run; the adapter converts them to per-region
/// diagnostics.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The engine process could not be started.
    #[error("failed to launch '{program}': {detail}")]
    Launch { program: String, detail: String },

    /// The engine process ran but exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The engine process overran its deadline and was killed.
    #[error("'{program}' killed after {secs}s")]
    TimedOut { program: String, secs: u64 },

    /// The engine answered in a shape this crate does not understand.
    #[error("uninterpretable engine output: {detail}")]
    UnrecognizedOutput { detail: String },
}

/// An interchangeable recognition capability.
///
/// Implementations must be `Send + Sync`; the pipeline shares them behind an
/// `Arc` and serializes calls through each instance (one in-flight call per
/// backend at a time).
pub trait RecognitionBackend: Send + Sync {
    /// Stable engine identifier, stamped as `method` on every result.
    fn name(&self) -> &str;

    /// Recognize the content of the image at `image`.
    fn recognize(&self, image: &Path) -> Result<RawRecognition, BackendError>;
}

/// A backend that shells out to an external OCR program.
///
/// The argument list may contain the `{image}` placeholder, replaced with
/// the temp-file path at call time; with no placeholder the path is appended
/// as the final argument.
pub struct CommandBackend {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandBackend {
    /// A formula engine invoked as `<program> <image>`.
    ///
    /// Matches the `pix2tex` CLI convention: one image path in, LaTeX out.
    pub fn formula(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args: vec!["{image}".into()],
            timeout: None,
        }
    }

    /// A text engine invoked as `<program> <image> stdout tsv`.
    ///
    /// Matches the `tesseract` CLI convention; TSV output carries per-word
    /// confidences that [`parse_stdout`] folds into per-line candidates.
    pub fn text(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args: vec!["{image}".into(), "stdout".into(), "tsv".into()],
            timeout: None,
        }
    }

    /// Kill the engine process if one call outruns `timeout`.
    ///
    /// Without this, an engine that hangs keeps running after its region has
    /// been abandoned and the orphans pile up across a large document.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check whether the underlying program can be started at all.
    ///
    /// Probed exactly once at adapter construction; the exit status of the
    /// version call is irrelevant — only a failed spawn means the engine is
    /// absent.
    pub fn probe(&self) -> Result<(), String> {
        match Command::new(&self.program).arg("--version").output() {
            Ok(_) => Ok(()),
            Err(e) => Err(format!("'{}' not runnable: {e}", self.program)),
        }
    }
}

impl RecognitionBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &Path) -> Result<RawRecognition, BackendError> {
        let image_str = image.to_string_lossy();
        let mut cmd = Command::new(&self.program);
        let mut placed = false;
        for arg in &self.args {
            if arg.contains("{image}") {
                cmd.arg(arg.replace("{image}", &image_str));
                placed = true;
            } else {
                cmd.arg(arg);
            }
        }
        if !placed {
            cmd.arg(image_str.as_ref());
        }

        let output = match self.timeout {
            Some(deadline) => self.run_with_deadline(cmd, deadline)?,
            None => cmd.output().map_err(|e| BackendError::Launch {
                program: self.program.clone(),
                detail: e.to_string(),
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: truncate(stderr.trim(), 200),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("{}: {} bytes of raw output", self.name, stdout.len());
        parse_stdout(&stdout)
    }
}

impl CommandBackend {
    /// Run the engine process, killing it if it outruns `deadline`.
    ///
    /// Pipes are drained on separate threads so a chatty engine cannot
    /// block itself on a full pipe buffer while we wait for it to exit.
    fn run_with_deadline(
        &self,
        mut cmd: Command,
        deadline: Duration,
    ) -> Result<Output, BackendError> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Launch {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        let stdout_reader = drain_on_thread(child.stdout.take());
        let stderr_reader = drain_on_thread(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BackendError::TimedOut {
                        program: self.program.clone(),
                        secs: deadline.as_secs(),
                    });
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(25)),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BackendError::Launch {
                        program: self.program.clone(),
                        detail: e.to_string(),
                    });
                }
            }
        };

        Ok(Output {
            status,
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
        })
    }
}

fn drain_on_thread<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).ok();
        }
        buf
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let cut = s
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}\u{2026}", &s[..cut])
    } else {
        s.to_string()
    }
}

// ── Raw output sniffing ──────────────────────────────────────────────────

/// Interpret raw engine stdout into one of the accepted shapes.
///
/// Sniffing order: JSON first (string, pair, line collections, keyed maps),
/// then tesseract-style TSV, then plain text. JSON that parses but matches
/// none of the accepted shapes is an error; free text never is.
pub fn parse_stdout(raw: &str) -> Result<RawRecognition, BackendError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return shape_from_value(&value).ok_or_else(|| BackendError::UnrecognizedOutput {
            detail: format!("unsupported JSON shape: {}", truncate(trimmed, 120)),
        });
    }

    if let Some(lines) = parse_tsv(trimmed) {
        return Ok(lines);
    }

    Ok(RawRecognition::Content(trimmed.to_string()))
}

/// Map an arbitrary JSON value onto an accepted shape, if any.
fn shape_from_value(value: &Value) -> Option<RawRecognition> {
    match value {
        Value::String(s) => Some(RawRecognition::Content(s.clone())),
        Value::Array(items) => {
            // A bare `[content, confidence]` pair.
            if let Some(line) = pair_from_slice(items) {
                return Some(RawRecognition::Scored(line.content, line.confidence?));
            }
            // Otherwise a collection of per-line entries.
            let lines: Vec<RawLine> = items.iter().filter_map(line_from_value).collect();
            if lines.is_empty() && !items.is_empty() {
                return None;
            }
            Some(RawRecognition::Lines(lines))
        }
        Value::Object(map) => {
            // A single `{ "text": ..., "confidence": ... }` record.
            if let Some(line) = line_from_object(map) {
                return Some(match line.confidence {
                    Some(c) => RawRecognition::Scored(line.content, c),
                    None => RawRecognition::Content(line.content),
                });
            }
            // A keyed map of line → entry. Keys are sorted so the candidate
            // order is reproducible regardless of serialisation order.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let lines: Vec<RawLine> = keys
                .iter()
                .filter_map(|k| line_from_value(&map[k.as_str()]))
                .collect();
            if lines.is_empty() && !map.is_empty() {
                return None;
            }
            Some(RawRecognition::Lines(lines))
        }
        _ => None,
    }
}

/// `[content, confidence]` → a scored line.
fn pair_from_slice(items: &[Value]) -> Option<RawLine> {
    if items.len() != 2 {
        return None;
    }
    let content = items[0].as_str()?;
    let confidence = items[1].as_f64()? as f32;
    Some(RawLine {
        content: content.to_string(),
        confidence: Some(confidence),
    })
}

/// One per-line entry: a bare string, a `[text, conf]` pair, or an object.
fn line_from_value(value: &Value) -> Option<RawLine> {
    match value {
        Value::String(s) => Some(RawLine {
            content: s.clone(),
            confidence: None,
        }),
        Value::Array(items) => pair_from_slice(items).or_else(|| {
            // A single-element `[text]` entry.
            if items.len() == 1 {
                items[0].as_str().map(|s| RawLine {
                    content: s.to_string(),
                    confidence: None,
                })
            } else {
                None
            }
        }),
        Value::Object(map) => line_from_object(map),
        _ => None,
    }
}

fn line_from_object(map: &serde_json::Map<String, Value>) -> Option<RawLine> {
    let content = map
        .get("text")
        .or_else(|| map.get("content"))?
        .as_str()?
        .to_string();
    let confidence = map
        .get("confidence")
        .or_else(|| map.get("conf"))
        .or_else(|| map.get("score"))
        .and_then(Value::as_f64)
        .map(|c| c as f32);
    Some(RawLine {
        content,
        confidence,
    })
}

/// Fold tesseract-style TSV into per-line candidates.
///
/// Words sharing a `(page, block, paragraph, line)` key are joined with
/// spaces; the line confidence is the mean word confidence on the tesseract
/// 0–100 scale, mapped to [0, 1]. Rows with a negative confidence are
/// structural (no word) and are skipped.
fn parse_tsv(raw: &str) -> Option<RawRecognition> {
    let mut rows = raw.lines();
    let header: Vec<&str> = rows.next()?.split('\t').collect();
    let conf_col = header.iter().position(|h| *h == "conf")?;
    let text_col = header.iter().position(|h| *h == "text")?;
    if header.len() < 6 {
        return None;
    }

    // (key, words, confidences) in encounter order.
    let mut lines: Vec<(Vec<String>, Vec<String>, Vec<f32>)> = Vec::new();

    for row in rows {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() <= text_col.max(conf_col) {
            continue;
        }
        let conf: f32 = match cols[conf_col].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        let text = cols[text_col].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }
        // Columns 1..5 are page/block/paragraph/line numbers.
        let key: Vec<String> = cols[1..5.min(cols.len())]
            .iter()
            .map(|c| c.to_string())
            .collect();
        match lines.last_mut() {
            Some((last_key, words, confs)) if *last_key == key => {
                words.push(text.to_string());
                confs.push(conf);
            }
            _ => lines.push((key, vec![text.to_string()], vec![conf])),
        }
    }

    let lines: Vec<RawLine> = lines
        .into_iter()
        .map(|(_, words, confs)| {
            let mean = confs.iter().sum::<f32>() / confs.len() as f32;
            RawLine {
                content: words.join(" "),
                confidence: Some(mean / 100.0),
            }
        })
        .collect();

    Some(RawRecognition::Lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_json_is_content() {
        let r = parse_stdout(r#""x^2 + y^2 = r^2""#).unwrap();
        assert_eq!(r, RawRecognition::Content("x^2 + y^2 = r^2".into()));
    }

    #[test]
    fn two_element_pair_is_scored() {
        let r = parse_stdout(r#"["\\frac{a}{b}", 0.93]"#).unwrap();
        match r {
            RawRecognition::Scored(content, conf) => {
                assert_eq!(content, "\\frac{a}{b}");
                assert!((conf - 0.93).abs() < 1e-6);
            }
            other => panic!("expected Scored, got {other:?}"),
        }
    }

    #[test]
    fn array_of_pairs_is_lines() {
        let r = parse_stdout(r#"[["Hello", 0.95], ["World", 0.5]]"#).unwrap();
        match r {
            RawRecognition::Lines(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].content, "Hello");
                assert_eq!(lines[1].confidence, Some(0.5));
            }
            other => panic!("expected Lines, got {other:?}"),
        }
    }

    #[test]
    fn array_of_objects_is_lines() {
        let r = parse_stdout(r#"[{"text": "a", "confidence": 0.8}, {"content": "b"}]"#).unwrap();
        match r {
            RawRecognition::Lines(lines) => {
                assert_eq!(lines[0].confidence, Some(0.8));
                assert_eq!(lines[1].content, "b");
                assert_eq!(lines[1].confidence, None);
            }
            other => panic!("expected Lines, got {other:?}"),
        }
    }

    #[test]
    fn keyed_map_sorts_for_determinism() {
        let r = parse_stdout(r#"{"line_2": ["b", 0.6], "line_1": ["a", 0.9]}"#).unwrap();
        match r {
            RawRecognition::Lines(lines) => {
                assert_eq!(lines[0].content, "a");
                assert_eq!(lines[1].content, "b");
            }
            other => panic!("expected Lines, got {other:?}"),
        }
    }

    #[test]
    fn single_object_with_confidence_is_scored() {
        let r = parse_stdout(r#"{"text": "E = mc^2", "conf": 0.99}"#).unwrap();
        assert_eq!(r, RawRecognition::Scored("E = mc^2".into(), 0.99));
    }

    #[test]
    fn json_number_is_unrecognised() {
        let err = parse_stdout("42").unwrap_err();
        assert!(matches!(err, BackendError::UnrecognizedOutput { .. }));
    }

    #[test]
    fn json_array_of_numbers_is_unrecognised() {
        let err = parse_stdout("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, BackendError::UnrecognizedOutput { .. }));
    }

    #[test]
    fn plain_text_falls_through_to_content() {
        let r = parse_stdout("\\sum_{i=0}^{n} i\n").unwrap();
        assert_eq!(r, RawRecognition::Content("\\sum_{i=0}^{n} i".into()));
    }

    #[test]
    fn tesseract_tsv_groups_words_into_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t96\tHello\n\
                   5\t1\t1\t1\t1\t2\t12\t0\t10\t10\t94\tthere\n\
                   5\t1\t1\t1\t2\t1\t0\t14\t10\t10\t50\tWorld\n\
                   4\t1\t1\t1\t3\t0\t0\t28\t10\t10\t-1\t\n";
        let r = parse_stdout(tsv).unwrap();
        match r {
            RawRecognition::Lines(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].content, "Hello there");
                assert!((lines[0].confidence.unwrap() - 0.95).abs() < 1e-3);
                assert_eq!(lines[1].content, "World");
                assert!((lines[1].confidence.unwrap() - 0.50).abs() < 1e-3);
            }
            other => panic!("expected Lines, got {other:?}"),
        }
    }

    #[test]
    fn empty_stdout_is_empty_content() {
        let r = parse_stdout("   \n").unwrap();
        assert_eq!(r, RawRecognition::Content(String::new()));
    }

    #[test]
    fn probe_reports_missing_program() {
        let backend = CommandBackend::formula("pdf2tex-no-such-engine");
        let err = backend.probe().unwrap_err();
        assert!(err.contains("pdf2tex-no-such-engine"));
    }

    #[test]
    fn recognize_missing_program_is_launch_error() {
        let backend = CommandBackend::text("pdf2tex-no-such-engine");
        let err = backend.recognize(Path::new("/nonexistent.png")).unwrap_err();
        assert!(matches!(err, BackendError::Launch { .. }));
    }

    #[test]
    fn hung_engine_is_killed_at_the_deadline() {
        // `sleep 30 <image>` parses the trailing path as another duration
        // and keeps sleeping; the deadline must kill it, not wait it out.
        let backend = CommandBackend {
            name: "sleeper".into(),
            program: "sleep".into(),
            args: vec!["30".into(), "{image}".into()],
            timeout: Some(Duration::from_millis(200)),
        };
        let started = Instant::now();
        let err = backend.recognize(Path::new("5")).unwrap_err();
        assert!(matches!(err, BackendError::TimedOut { .. }), "{err}");
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "call returned only after the engine finished on its own"
        );
    }

    #[test]
    fn fast_engine_is_unaffected_by_the_deadline() {
        let backend = CommandBackend::formula("true").with_timeout(Duration::from_secs(30));
        let r = backend.recognize(Path::new("/nonexistent.png")).unwrap();
        assert_eq!(r, RawRecognition::Content(String::new()));
    }
}
