//! Provider escalation for a single page.
//!
//! This module owns the retry policy so the provider clients can stay thin.
//!
//! ## Retry strategy
//!
//! 429 / 5xx / transport errors are transient and frequent under concurrent
//! load. Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids
//! thundering-herd: with the 500 ms default and 3 retries the wait sequence
//! is 500 ms → 1 s → 2 s. A vendor-supplied `Retry-After` overrides the
//! computed backoff when it is longer. Auth errors and other 4xx responses
//! are terminal and fail the page immediately.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use crate::config::ParseConfig;
use crate::error::{PageError, ParseError};
use crate::output::{PageRecord, ParseSource};
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use crate::providers::{VisionProvider, VisionRequest};

use super::encode::EncodedPage;

/// Send one page image to the provider, retrying transient failures.
///
/// Always returns a `PageRecord` — never propagates the error upward, so a
/// single bad page cannot abort the document. Callers check `record.error`.
/// The record's `confidence` is left at 0.0; the dispatcher re-scores the
/// cleaned text afterwards so library and AI pages share one metric.
pub async fn escalate_page(
    provider: &Arc<dyn VisionProvider>,
    page_num: usize,
    image: &EncodedPage,
    config: &ParseConfig,
) -> PageRecord {
    let start = Instant::now();
    let request = VisionRequest {
        prompt: config.prompt.as_deref().unwrap_or(DEFAULT_EXTRACTION_PROMPT),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };

    let mut last_err: Option<ParseError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let mut backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            if let Some(ParseError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            }) = &last_err
            {
                backoff = backoff.max(secs * 1000);
            }
            warn!(
                "page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.extract_text(image, &request);
        let result = match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Ok(result) => result,
            Err(_) => Err(ParseError::ApiTimeout {
                page: page_num,
                elapsed_ms: config.api_timeout_secs * 1000,
            }),
        };

        match result {
            Ok(extraction) => {
                let duration = start.elapsed();
                debug!(
                    "page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, extraction.input_tokens, extraction.output_tokens, duration
                );
                return PageRecord {
                    page: page_num,
                    text: extraction.text,
                    source: ParseSource::Ai(provider.kind()),
                    confidence: 0.0,
                    input_tokens: extraction.input_tokens,
                    output_tokens: extraction.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Err(e) => {
                let retryable = e.is_retryable();
                warn!("page {}: attempt {} failed — {}", page_num, attempt + 1, e);
                last_err = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let duration = start.elapsed();
    let error = match &last_err {
        Some(ParseError::ApiTimeout { .. }) => PageError::Timeout {
            page: page_num,
            secs: config.api_timeout_secs,
        },
        other => PageError::AiFailed {
            page: page_num,
            retries: config.max_retries as u8,
            detail: other
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        },
    };

    PageRecord {
        page: page_num,
        text: String::new(),
        source: ParseSource::Ai(provider.kind()),
        confidence: 0.0,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: duration.as_millis() as u64,
        retries: config.max_retries as u8,
        error: Some(error),
    }
}
