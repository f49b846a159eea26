//! The per-page parsing pipeline.
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path / upload bytes (%PDF magic)
//!  ├─ 2. Extract   per-page library text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Classify  score each page's extraction confidence
//!  ├─ 4. Render    rasterise only the low-confidence pages
//!  ├─ 5. Encode    PNG → base64 page image
//!  ├─ 6. Escalate  provider call with retry/backoff/timeout
//!  └─ 7. Polish    deterministic text cleanup
//! ```
//!
//! Orchestration (which pages take which path) lives in [`crate::parse`].

pub mod classify;
pub mod encode;
pub mod escalate;
pub mod extract;
pub mod input;
pub mod postprocess;
pub mod render;

use pdfium_render::prelude::*;

use crate::error::ParseError;

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH` env var, the working directory,
/// `/opt/pdfium/lib`, then the system library path. pdfium is not safe to
/// share across threads, so callers create a fresh binding inside each
/// `spawn_blocking` closure rather than caching one.
pub(crate) fn bind_pdfium() -> Result<Pdfium, ParseError> {
    let bindings = if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        Pdfium::bind_to_library(&path)
            .map_err(|e| ParseError::PdfiumBindingFailed(format!("PDFIUM_LIB_PATH={path}: {e}")))?
    } else {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "/opt/pdfium/lib",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ParseError::PdfiumBindingFailed(e.to_string()))?
    };
    Ok(Pdfium::new(bindings))
}

/// Whether a pdfium library can be bound in this environment.
///
/// Used by the health check; the result is cheap enough to probe at startup.
pub fn pdfium_available() -> bool {
    bind_pdfium().is_ok()
}

/// Open a document, mapping pdfium's opaque load failures onto the error
/// taxonomy (password-protected vs. plain corruption).
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    path: &std::path::Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ParseError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            if password.is_some() {
                ParseError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ParseError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ParseError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}
