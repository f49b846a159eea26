//! Error types for the pdf-parser-pro library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ParseError`] — **Fatal**: the parse cannot proceed at all (bad input
//!   file, wrong password, a required provider not configured). Returned as
//!   `Err(ParseError)` from the top-level `parse*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch,
//!   transient API error) but all other pages are fine. Stored inside
//!   [`crate::output::PageRecord`] so callers can inspect partial success
//!   rather than losing the whole document to one bad page.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! page failure, log and continue, or collect all errors for a post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-parser-pro library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageRecord`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ParseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// The uploaded file body was empty.
    #[error("Uploaded file '{name}' is empty")]
    EmptyUpload { name: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The requested (or any) AI provider is not configured.
    #[error("AI provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Provider returned an authentication error (401/403) — retry is useless.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Provider returned HTTP 429 — caller should back off.
    ///
    /// Check `retry_after_secs` for a server-specified delay, or use
    /// exponential backoff if `None`.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Provider API returned an error or the transport failed.
    ///
    /// `status` is `None` for transport-level failures (DNS, connect, TLS),
    /// which are treated as retryable alongside 5xx responses.
    #[error("API error from provider '{provider}': {message}")]
    ApiError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Provider call timed out — the caller may retry.
    #[error("API call timed out after {elapsed_ms}ms on page {page}")]
    ApiTimeout { page: usize, elapsed_ms: u64 },

    /// Every selected page failed; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An unrecognised request value (strategy, provider or page selection).
    #[error("Invalid request parameter: {0}")]
    InvalidParameter(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParseError {
    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Rate limits, timeouts, transport failures and 5xx responses are
    /// transient; auth failures and other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ParseError::RateLimited { .. } | ParseError::ApiTimeout { .. } => true,
            ParseError::ApiError { status, .. } => match status {
                None => true,
                Some(s) => *s >= 500,
            },
            _ => false,
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageRecord`] when a page fails.
/// The overall parse continues unless ALL pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or encoding failed before the AI call.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// AI escalation failed after retries.
    #[error("Page {page}: AI extraction failed after {retries} retries: {detail}")]
    AiFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// AI escalation timed out.
    #[error("Page {page}: AI extraction timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_display_with_retry() {
        let e = ParseError::RateLimited {
            provider: "openai".into(),
            retry_after_secs: Some(60),
        };
        assert!(e.to_string().contains("openai"));
    }

    #[test]
    fn api_timeout_display() {
        let e = ParseError::ApiTimeout {
            page: 3,
            elapsed_ms: 5000,
        };
        assert!(e.to_string().contains("5000ms"));
        assert!(e.to_string().contains("page 3"));
    }

    #[test]
    fn auth_error_display() {
        let e = ParseError::AuthError {
            provider: "anthropic".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("anthropic"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn retryability_classification() {
        assert!(ParseError::RateLimited {
            provider: "gemini".into(),
            retry_after_secs: None,
        }
        .is_retryable());
        assert!(ParseError::ApiTimeout {
            page: 1,
            elapsed_ms: 100,
        }
        .is_retryable());
        assert!(ParseError::ApiError {
            provider: "openai".into(),
            status: Some(503),
            message: "overloaded".into(),
        }
        .is_retryable());
        assert!(ParseError::ApiError {
            provider: "openai".into(),
            status: None,
            message: "connection reset".into(),
        }
        .is_retryable());
        assert!(!ParseError::ApiError {
            provider: "openai".into(),
            status: Some(400),
            message: "bad request".into(),
        }
        .is_retryable());
        assert!(!ParseError::AuthError {
            provider: "openai".into(),
            detail: "bad key".into(),
        }
        .is_retryable());
    }

    #[test]
    fn all_pages_failed_display() {
        let e = ParseError::AllPagesFailed {
            total: 10,
            retries: 3,
            first_error: "boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("10"), "got: {msg}");
        assert!(msg.contains("boom"), "got: {msg}");
    }
}
