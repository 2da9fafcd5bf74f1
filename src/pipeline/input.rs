//! Input resolution: validate a user-supplied PDF path before any work.
//!
//! Existence and the `%PDF` magic are checked up front so the caller gets a
//! precise error rather than a pdfium crash three stages later. Nothing here
//! mutates the source file; the pipeline only ever reads it.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a local PDF path, validating existence, readability, and magic.
pub fn resolve_input(path_str: &str) -> Result<PathBuf, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ExtractError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    debug!("Resolved input PDF: {}", path.display());
    Ok(path)
}

/// A short identifier for the document, used in run-directory names.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"PK\x03\x04zipzip")
            .unwrap();
        let err = resolve_input(path.to_str().unwrap()).unwrap_err();
        match err {
            ExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.7\n%fake body")
            .unwrap();
        let resolved = resolve_input(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn stem_falls_back_for_odd_paths() {
        assert_eq!(document_stem(Path::new("papers/attention.pdf")), "attention");
        assert_eq!(document_stem(Path::new("/")), "document");
    }
}
