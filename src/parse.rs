//! Smart dispatch: the top-level parse entry points.
//!
//! The economics drive the shape of this module: library extraction is free
//! and answers most pages, so it always runs first and an AI provider is
//! resolved only once at least one page actually needs escalation. A
//! document whose pages all classify as confident never constructs an HTTP
//! client at all.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ParseConfig, Strategy};
use crate::error::{PageError, ParseError};
use crate::keys::{page_cost_usd, KeyStore};
use crate::output::{DocumentMetadata, PageRecord, ParseOutput, ParseSource, ParseStats};
use crate::pipeline::{classify, encode, escalate, extract, input, postprocess, render};
use crate::providers::{build_provider, ProviderKind, VisionProvider};

/// Parse a PDF file.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ParseOutput)` on success, even if some pages failed
/// (check `output.stats.failed_pages`).
///
/// # Errors
/// Returns `Err(ParseError)` only for fatal errors:
/// - File not found / not a PDF / wrong password
/// - `strategy=ai` with no provider configured
/// - All selected pages failed and no text was produced
pub async fn parse(
    input_path: impl AsRef<Path>,
    config: &ParseConfig,
) -> Result<ParseOutput, ParseError> {
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = input::resolve_pdf_path(input_path.as_ref())?;
    info!(
        "starting parse: {} (strategy={})",
        pdf_path.display(),
        config.strategy
    );

    // ── Step 2: Metadata and page selection ──────────────────────────────
    let metadata = extract::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(ParseError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("selected {} of {} pages", page_indices.len(), total_pages);

    // ── Step 3: Library extraction ───────────────────────────────────────
    let extract_start = Instant::now();
    let extracted =
        extract::extract_pages(&pdf_path, config.password.as_deref(), &page_indices).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 4: Classify and partition ───────────────────────────────────
    let mut library_pages: HashMap<usize, (String, f32)> = HashMap::new();
    let mut escalation: Vec<usize> = Vec::new();
    for (idx, text) in extracted {
        let score = classify::score_page(&text, config.min_chars);
        if classify::needs_escalation(config.strategy, score, config.confidence_threshold) {
            escalation.push(idx);
        }
        library_pages.insert(idx, (text, score));
    }
    info!(
        "library extraction: {} confident, {} to escalate ({}ms)",
        library_pages.len() - escalation.len(),
        escalation.len(),
        extract_duration_ms
    );

    // ── Step 5: Escalate low-confidence pages ────────────────────────────
    let mut render_duration_ms = 0u64;
    let mut ai_duration_ms = 0u64;
    let mut provider_used: Option<ProviderKind> = None;
    let mut escalated: HashMap<usize, PageRecord> = HashMap::new();

    if !escalation.is_empty() {
        match resolve_provider(config) {
            Ok(provider) => {
                provider_used = Some(provider.kind());
                info!(
                    "escalating {} pages to {} ({})",
                    escalation.len(),
                    provider.kind(),
                    provider.model()
                );

                let render_start = Instant::now();
                let rendered = render::render_pages(&pdf_path, config, &escalation).await?;
                render_duration_ms = render_start.elapsed().as_millis() as u64;

                let mut encoded: Vec<(usize, encode::EncodedPage)> = Vec::new();
                let mut prep_failures: Vec<(usize, String)> = Vec::new();
                let mut rendered_set = std::collections::HashSet::new();
                for (idx, img) in &rendered {
                    rendered_set.insert(*idx);
                    match encode::encode_page(img) {
                        Ok(page) => encoded.push((*idx, page)),
                        Err(e) => prep_failures.push((*idx, format!("image encoding failed: {e}"))),
                    }
                }
                for &idx in &escalation {
                    if !rendered_set.contains(&idx) {
                        prep_failures.push((idx, "page did not render".to_string()));
                    }
                }

                let ai_start = Instant::now();
                let results: Vec<PageRecord> = stream::iter(encoded.into_iter().map(
                    |(idx, page_image)| {
                        let provider = Arc::clone(&provider);
                        let config = config.clone();
                        async move {
                            escalate::escalate_page(&provider, idx + 1, &page_image, &config).await
                        }
                    },
                ))
                .buffer_unordered(config.concurrency)
                .collect()
                .await;
                ai_duration_ms = ai_start.elapsed().as_millis() as u64;

                for record in results {
                    escalated.insert(record.page - 1, record);
                }
                for (idx, detail) in prep_failures {
                    escalated.insert(
                        idx,
                        PageRecord {
                            page: idx + 1,
                            text: String::new(),
                            source: ParseSource::Ai(provider.kind()),
                            confidence: 0.0,
                            input_tokens: 0,
                            output_tokens: 0,
                            duration_ms: 0,
                            retries: 0,
                            error: Some(PageError::RenderFailed {
                                page: idx + 1,
                                detail,
                            }),
                        },
                    );
                }
            }
            Err(e) if config.strategy == Strategy::Ai => return Err(e),
            Err(e) => {
                // No key, no escalation: the run still succeeds, it just
                // stops being smart about bad pages.
                warn!(
                    "no AI provider available ({e}); keeping library text for {} low-confidence pages",
                    escalation.len()
                );
            }
        }
    }

    // ── Step 6: Merge paths ──────────────────────────────────────────────
    let mut records: Vec<PageRecord> = Vec::with_capacity(page_indices.len());
    for (&idx, (text, score)) in &library_pages {
        match escalated.remove(&idx) {
            None => records.push(library_record(idx + 1, text.clone(), *score)),
            Some(record) if record.error.is_none() => records.push(record),
            Some(failed) => {
                // AI escalation failed. Under auto we still hold usable
                // library text; hand it back with the error attached so the
                // caller can see the fallback happened.
                if config.strategy == Strategy::Auto && !text.trim().is_empty() {
                    let mut fallback = library_record(idx + 1, text.clone(), *score);
                    fallback.retries = failed.retries;
                    fallback.error = failed.error;
                    records.push(fallback);
                } else {
                    records.push(failed);
                }
            }
        }
    }

    // ── Step 7: Post-process and re-score ────────────────────────────────
    for record in &mut records {
        record.text = postprocess::clean_text(&record.text);
        if record.error.is_none() {
            record.confidence = classify::score_page(&record.text, config.min_chars);
        }
    }
    records.sort_by_key(|r| r.page);

    // ── Step 8: Stats and assembly ───────────────────────────────────────
    let failed = records
        .iter()
        .filter(|r| r.error.is_some() && r.text.is_empty())
        .count();
    if failed == records.len() && !records.is_empty() {
        let first_error = records
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ParseError::AllPagesFailed {
            total: records.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    let library = records
        .iter()
        .filter(|r| matches!(r.source, ParseSource::Library) && !(r.error.is_some() && r.text.is_empty()))
        .count();
    let ai = records
        .iter()
        .filter(|r| matches!(r.source, ParseSource::Ai(_)) && !(r.error.is_some() && r.text.is_empty()))
        .count();

    let stats = ParseStats {
        total_pages,
        selected_pages: page_indices.len(),
        library_pages: library,
        ai_pages: ai,
        failed_pages: failed,
        input_tokens: records.iter().map(|r| r.input_tokens as u64).sum(),
        output_tokens: records.iter().map(|r| r.output_tokens as u64).sum(),
        extract_duration_ms,
        render_duration_ms,
        ai_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        estimated_cost_usd: provider_used
            .map(|kind| ai as f64 * page_cost_usd(kind))
            .unwrap_or(0.0),
    };

    info!(
        "parse complete: {}/{} pages ({} library, {} ai) in {}ms",
        records.len() - failed,
        stats.selected_pages,
        library,
        ai,
        stats.total_duration_ms
    );

    Ok(ParseOutput {
        text: assemble_text(&records),
        pages: records,
        metadata,
        stats,
        strategy: config.strategy,
        provider: provider_used,
    })
}

/// Parse PDF bytes in memory.
///
/// pdfium needs a file-system path, so the bytes go into a managed
/// [`tempfile`] that is cleaned up automatically on return or panic. This
/// is the path the upload endpoints use.
pub async fn parse_from_bytes(
    bytes: &[u8],
    config: &ParseConfig,
) -> Result<ParseOutput, ParseError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ParseError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ParseError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `parse` returns
    parse(tmp.path(), config).await
}

/// Extract document metadata without parsing content.
///
/// Does not require an AI provider or API key.
pub async fn inspect(input_path: impl AsRef<Path>) -> Result<DocumentMetadata, ParseError> {
    let pdf_path = input::resolve_pdf_path(input_path.as_ref())?;
    extract::extract_metadata(&pdf_path, None).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn library_record(page: usize, text: String, confidence: f32) -> PageRecord {
    PageRecord {
        page,
        text,
        source: ParseSource::Library,
        confidence,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: None,
    }
}

/// Resolve the AI provider, from most-specific to least-specific:
/// a pre-built provider on the config, then the explicitly requested kind,
/// then the first kind with a key in the environment.
fn resolve_provider(config: &ParseConfig) -> Result<Arc<dyn VisionProvider>, ParseError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let keys = KeyStore::from_env();
    let kind = config
        .provider_kind
        .or_else(|| keys.first_configured())
        .ok_or_else(|| ParseError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "Set OPENAI_API_KEY, GEMINI_API_KEY or ANTHROPIC_API_KEY.".to_string(),
        })?;
    let key = keys
        .key_for(kind)
        .ok_or_else(|| ParseError::ProviderNotConfigured {
            provider: kind.as_str().to_string(),
            hint: format!("Export {} to enable it.", kind.env_var()),
        })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .build()
        .map_err(|e| ParseError::Internal(format!("http client: {e}")))?;

    Ok(build_provider(kind, key, config.model.as_deref(), client))
}

/// Assemble the document text: successful pages in order, each with a
/// `Page N:` header.
fn assemble_text(records: &[PageRecord]) -> String {
    let parts: Vec<String> = records
        .iter()
        .filter(|r| !r.text.is_empty())
        .map(|r| format!("Page {}:\n{}", r.page, r.text))
        .collect();
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_text_skips_empty_pages() {
        let records = vec![
            library_record(1, "First page".into(), 0.9),
            library_record(2, String::new(), 0.0),
            library_record(3, "Third page".into(), 0.8),
        ];
        let text = assemble_text(&records);
        assert_eq!(text, "Page 1:\nFirst page\n\nPage 3:\nThird page");
    }

    #[test]
    fn assemble_text_empty_document() {
        assert_eq!(assemble_text(&[]), "");
    }

    #[test]
    fn resolve_provider_prefers_prebuilt() {
        // a config with no env keys but a pre-built provider must not fail
        let mock = Arc::new(crate::providers::MockProvider::new(
            ProviderKind::OpenAi,
            vec![],
        ));
        let config = ParseConfig::builder()
            .provider(mock as Arc<dyn VisionProvider>)
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.kind(), ProviderKind::OpenAi);
    }
}
