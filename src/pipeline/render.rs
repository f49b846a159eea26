//! Rasterisation of escalated pages.
//!
//! Only pages heading to a provider get rendered — the whole economy of the
//! dispatcher depends on not paying this cost for pages the library path
//! already answered. Rendering runs inside `spawn_blocking` since pdfium is
//! CPU-bound and not async-safe.
//!
//! Pixel cap instead of DPI: page sizes vary wildly, and an A0 poster at a
//! fixed DPI could allocate a 13 000 × 18 000 px image. Capping the longest
//! edge keeps memory bounded and lands in the sweet spot vision models
//! actually resolve (1 024–2 048 px).

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use crate::config::ParseConfig;
use crate::error::ParseError;

use super::{bind_pdfium, load_document};

/// Rasterise the given pages (0-indexed) into images.
///
/// A page that fails to render is logged and omitted from the result; the
/// dispatcher treats missing pages as render failures and falls back to
/// whatever library text it has.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ParseConfig,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, ParseError> {
    let path = pdf_path.to_path_buf();
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| ParseError::Internal(format!("render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, ParseError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!("skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }

        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("failed to load page {} for rendering: {:?}", idx + 1, e);
                continue;
            }
        };

        match page.render_with_config(&render_config) {
            Ok(bitmap) => {
                let image = bitmap.as_image();
                debug!(
                    "rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                results.push((idx, image));
            }
            Err(e) => {
                warn!("rasterisation failed for page {}: {:?}", idx + 1, e);
            }
        };
    }

    Ok(results)
}
