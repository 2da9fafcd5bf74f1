//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so the async workers never stall on CPU-heavy rendering.
//!
//! ## Why is a page failure fatal here?
//!
//! Recognition failures are isolated per region, but a page missing from
//! the enhanced document would shift every downstream page index — so an
//! unreadable page aborts the run before any engine ever sees the document.

use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One rasterised page, not yet enhanced.
pub struct RenderedPage {
    /// 0-based page index.
    pub index: usize,
    /// Original page width in PDF points.
    pub width_pts: f32,
    /// Original page height in PDF points.
    pub height_pts: f32,
    pub image: DynamicImage,
}

/// Document-level facts, obtainable without rendering anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub pdf_version: String,
}

/// Rasterise every page of the PDF at the given DPI.
///
/// Runs inside `spawn_blocking`; pages come back in document order.
pub async fn render_pages(
    pdf_path: &Path,
    dpi: u32,
    password: Option<&str>,
) -> Result<Vec<RenderedPage>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, dpi, password.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    password: Option<&str>,
) -> Result<Vec<RenderedPage>, ExtractError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    // PDF points are 1/72 inch, so the scale factor is dpi / 72.
    let scale = dpi as f32 / 72.0;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractError::RasterisationFailed {
                page: idx,
                detail: format!("{e:?}"),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| ExtractError::RasterisationFailed {
                    page: idx,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px at {} DPI",
            idx,
            image.width(),
            image.height(),
            dpi
        );

        results.push(RenderedPage {
            index: idx,
            width_pts: page.width().value,
            height_pts: page.height().value,
            image,
        });
    }

    Ok(results)
}

/// Read document info from a PDF without rendering pages.
pub async fn document_info(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || document_info_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Info task panicked: {e}")))?
}

fn document_info_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ExtractError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, pdf_path, password)?;

    let title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        });

    Ok(DocumentInfo {
        page_count: document.pages().len() as usize,
        title,
        pdf_version: format!("{:?}", document.version()),
    })
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExtractError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
