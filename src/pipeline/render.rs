//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so the Tokio workers never stall during CPU-heavy rendering.
//! The pdfium document handle is not `Send`, so each render call opens the
//! document inside its own blocking closure — the same price the original
//! extractor paid, and irrelevant next to the recognition round-trip.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A3 batch-record appendix at 300 DPI could
//! produce a huge bitmap. `max_pixels` caps the longest edge regardless of
//! physical size, keeping memory bounded and matching the image-size sweet
//! spot for vision models.

use crate::error::ExtractError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A page failed to rasterise. Unit-level: the orchestrator skips the unit
/// and continues the batch.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct RenderError {
    pub detail: String,
}

/// Capability interface for page rasterisation. The orchestrator only sees
/// this trait; tests substitute a deterministic stub.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Total pages in the document, for validating the page spec up front.
    fn page_count(&self) -> usize;

    /// Rasterise one page (1-indexed) to an image.
    async fn render_page(&self, page_number: u32) -> Result<DynamicImage, RenderError>;
}

/// The shipped renderer: pdfium at scan resolution, with pixel-capped output.
pub struct PdfiumRenderer {
    path: PathBuf,
    password: Option<String>,
    dpi: u32,
    max_pixels: u32,
    page_count: usize,
}

impl PdfiumRenderer {
    /// Open the document once to validate it and learn its page count.
    ///
    /// Load failures are fatal: a document that cannot be opened here will
    /// not open for any unit either.
    pub async fn open(
        path: &Path,
        password: Option<String>,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<Self, ExtractError> {
        let path_buf = path.to_path_buf();
        let pwd = password.clone();

        let page_count = tokio::task::spawn_blocking(move || -> Result<usize, ExtractError> {
            let pdfium = Pdfium::default();
            let document = pdfium
                .load_pdf_from_file(&path_buf, pwd.as_deref())
                .map_err(|e| load_error(&path_buf, pwd.as_deref(), e))?;
            Ok(document.pages().len() as usize)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Open task panicked: {e}")))??;

        debug!("PDF loaded: {} pages", page_count);

        Ok(Self {
            path: path.to_path_buf(),
            password,
            dpi,
            max_pixels,
            page_count,
        })
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn render_page(&self, page_number: u32) -> Result<DynamicImage, RenderError> {
        let path = self.path.clone();
        let password = self.password.clone();
        let dpi = self.dpi;
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || {
            render_page_blocking(&path, password.as_deref(), dpi, max_pixels, page_number)
        })
        .await
        .map_err(|e| RenderError {
            detail: format!("render task panicked: {e}"),
        })?
    }
}

fn render_page_blocking(
    path: &Path,
    password: Option<&str>,
    dpi: u32,
    max_pixels: u32,
    page_number: u32,
) -> Result<DynamicImage, RenderError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| RenderError {
            detail: format!("{e:?}"),
        })?;

    // PDF points are 72/inch; the scale factor turns the nominal DPI into
    // pixel dimensions, and the caps bound oversized appendix pages.
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = document
        .pages()
        .get((page_number - 1) as u16)
        .map_err(|e| RenderError {
            detail: format!("{e:?}"),
        })?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| RenderError {
            detail: format!("{e:?}"),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_number,
        image.width(),
        image.height()
    );

    Ok(image)
}

/// Map a pdfium load failure onto the fatal error taxonomy.
fn load_error(path: &Path, password: Option<&str>, e: PdfiumError) -> ExtractError {
    let err_str = format!("{e:?}");
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}
