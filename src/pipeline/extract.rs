//! Library text extraction: the free, deterministic path.
//!
//! pdfium wraps a C++ library with thread-local state, so all calls run on
//! the blocking pool via `spawn_blocking` and never from an async context
//! directly. One pass extracts every selected page; documents whose pages
//! all extract cleanly never touch the network at all.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::output::DocumentMetadata;

use super::{bind_pdfium, load_document};

/// Extract text for the selected pages (0-indexed).
///
/// A page whose text extraction fails yields an empty string rather than
/// an error — the classifier scores it 0.0 and the dispatcher decides what
/// to do with it, which is exactly the treatment a scanned page gets.
pub async fn extract_pages(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, String)>, ParseError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, pwd.as_deref(), &indices))
        .await
        .map_err(|e| ParseError::Internal(format!("extract task panicked: {e}")))?
}

fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<(usize, String)>, ParseError> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!("skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }

        let text = match pages.get(idx as u16) {
            Ok(page) => match page.text() {
                Ok(text) => text.all(),
                Err(e) => {
                    warn!("text extraction failed for page {}: {:?}", idx + 1, e);
                    String::new()
                }
            },
            Err(e) => {
                warn!("failed to load page {}: {:?}", idx + 1, e);
                String::new()
            }
        };

        debug!("extracted page {} → {} chars", idx + 1, text.len());
        results.push((idx, text));
    }

    Ok(results)
}

/// Extract document metadata without touching page content.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ParseError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ParseError::Internal(format!("metadata task panicked: {e}")))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ParseError> {
    use pdfium_render::prelude::PdfDocumentMetadataTagType;

    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
