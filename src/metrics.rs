//! Usage and cost tracking.
//!
//! The whole point of the smart dispatch is that library extraction handles
//! the bulk of pages for free. The tracker keeps the receipts: how many
//! pages each path answered, what the AI pages cost, and what the library
//! pages would have cost had they been escalated too.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::keys::page_cost_usd;
use crate::output::ParseOutput;
use crate::providers::ProviderKind;

/// Process-wide counters, shared across requests.
#[derive(Debug, Default)]
pub struct ParseTracker {
    inner: Mutex<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    requests: u64,
    pages_total: u64,
    pages_library: u64,
    pages_ai: u64,
    pages_failed: u64,
    ai_pages_by_provider: HashMap<ProviderKind, u64>,
    input_tokens: u64,
    output_tokens: u64,
    estimated_cost_usd: f64,
    estimated_savings_usd: f64,
    total_duration_ms: u64,
}

impl ParseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished parse into the counters.
    pub fn record(&self, output: &ParseOutput) {
        let stats = &output.stats;
        // Savings are priced at the rate of the provider the request would
        // have used; a request that never touched AI prices against openai.
        let rate = page_cost_usd(output.provider.unwrap_or(ProviderKind::OpenAi));

        let mut inner = self.inner.lock();
        inner.requests += 1;
        inner.pages_total += stats.selected_pages as u64;
        inner.pages_library += stats.library_pages as u64;
        inner.pages_ai += stats.ai_pages as u64;
        inner.pages_failed += stats.failed_pages as u64;
        if let Some(provider) = output.provider {
            *inner.ai_pages_by_provider.entry(provider).or_insert(0) += stats.ai_pages as u64;
        }
        inner.input_tokens += stats.input_tokens;
        inner.output_tokens += stats.output_tokens;
        inner.estimated_cost_usd += stats.estimated_cost_usd;
        inner.estimated_savings_usd += stats.library_pages as f64 * rate;
        inner.total_duration_ms += stats.total_duration_ms;
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let inner = self.inner.lock();
        let get = |kind| inner.ai_pages_by_provider.get(&kind).copied().unwrap_or(0);
        TrackerSnapshot {
            requests: inner.requests,
            pages_total: inner.pages_total,
            pages_library: inner.pages_library,
            pages_ai: inner.pages_ai,
            pages_failed: inner.pages_failed,
            ai_pages_by_provider: AiPagesByProvider {
                openai: get(ProviderKind::OpenAi),
                gemini: get(ProviderKind::Gemini),
                anthropic: get(ProviderKind::Anthropic),
            },
            input_tokens: inner.input_tokens,
            output_tokens: inner.output_tokens,
            estimated_cost_usd: inner.estimated_cost_usd,
            estimated_savings_usd: inner.estimated_savings_usd,
            library_ratio: if inner.pages_total == 0 {
                0.0
            } else {
                inner.pages_library as f64 / inner.pages_total as f64
            },
            avg_request_ms: if inner.requests == 0 {
                0
            } else {
                inner.total_duration_ms / inner.requests
            },
        }
    }
}

/// Point-in-time copy of the counters, served by `GET /metrics/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub requests: u64,
    pub pages_total: u64,
    pub pages_library: u64,
    pub pages_ai: u64,
    pub pages_failed: u64,
    pub ai_pages_by_provider: AiPagesByProvider,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_usd: f64,
    pub estimated_savings_usd: f64,
    /// Share of pages the free path answered.
    pub library_ratio: f64,
    pub avg_request_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPagesByProvider {
    pub openai: u64,
    pub gemini: u64,
    pub anthropic: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use crate::output::{DocumentMetadata, ParseStats};

    fn output(library: usize, ai: usize, provider: Option<ProviderKind>) -> ParseOutput {
        ParseOutput {
            text: String::new(),
            pages: vec![],
            metadata: DocumentMetadata::default(),
            stats: ParseStats {
                total_pages: library + ai,
                selected_pages: library + ai,
                library_pages: library,
                ai_pages: ai,
                estimated_cost_usd: ai as f64 * 0.01,
                total_duration_ms: 100,
                ..ParseStats::default()
            },
            strategy: Strategy::Auto,
            provider,
        }
    }

    #[test]
    fn record_accumulates_counters() {
        let tracker = ParseTracker::new();
        tracker.record(&output(9, 1, Some(ProviderKind::Gemini)));
        tracker.record(&output(5, 0, None));

        let snap = tracker.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.pages_total, 15);
        assert_eq!(snap.pages_library, 14);
        assert_eq!(snap.pages_ai, 1);
        assert_eq!(snap.ai_pages_by_provider.gemini, 1);
        assert_eq!(snap.ai_pages_by_provider.openai, 0);
        // 9 pages at the gemini rate + 5 pages at the openai fallback rate
        let expected_savings = 9.0 * 0.01 + 5.0 * 0.03;
        assert!((snap.estimated_savings_usd - expected_savings).abs() < 1e-9);
        assert!((snap.library_ratio - 14.0 / 15.0).abs() < 1e-9);
        assert_eq!(snap.avg_request_ms, 100);
    }

    #[test]
    fn empty_tracker_snapshot_is_zeroed() {
        let snap = ParseTracker::new().snapshot();
        assert_eq!(snap.requests, 0);
        assert_eq!(snap.library_ratio, 0.0);
        assert_eq!(snap.avg_request_ms, 0);
    }
}
