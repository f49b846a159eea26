//! Result types returned by the parse pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::Strategy;
use crate::error::PageError;
use crate::providers::ProviderKind;

/// Which path produced a page's text.
///
/// Serialises as `"library"` or `"ai:<provider>"` so the JSON stays flat and
/// greppable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Library,
    Ai(ProviderKind),
}

impl fmt::Display for ParseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSource::Library => f.write_str("library"),
            ParseSource::Ai(kind) => write!(f, "ai:{kind}"),
        }
    }
}

impl FromStr for ParseSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "library" {
            return Ok(ParseSource::Library);
        }
        if let Some(kind) = s.strip_prefix("ai:") {
            return kind
                .parse::<ProviderKind>()
                .map(ParseSource::Ai)
                .map_err(|e| e.to_string());
        }
        Err(format!("unknown parse source '{s}'"))
    }
}

impl Serialize for ParseSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ParseSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One parsed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page number (1-indexed).
    pub page: usize,
    /// Cleaned page text. Empty when the page failed.
    pub text: String,
    /// Which path produced the text.
    pub source: ParseSource,
    /// Classifier score of the returned text, 0.0–1.0.
    pub confidence: f32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Provider retries spent on this page (0 for library pages).
    pub retries: u8,
    /// Set when the page failed, or when an AI escalation failed and the
    /// page fell back to its library text.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<PageError>,
}

impl PageRecord {
    /// A page that produced usable text (possibly via fallback).
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Document-level metadata extracted without any AI involvement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Aggregate counters for one parse run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages matched by the page selection.
    pub selected_pages: usize,
    /// Pages answered by library extraction.
    pub library_pages: usize,
    /// Pages answered by an AI provider.
    pub ai_pages: usize,
    /// Pages with no usable text after all fallbacks.
    pub failed_pages: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub extract_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ai_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Estimated AI spend for this run, USD.
    pub estimated_cost_usd: f64,
}

/// Full result of a parse run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    /// Assembled document text: successful pages in order, each prefixed
    /// with a `Page N:` header.
    pub text: String,
    /// Per-page records, sorted by page number.
    pub pages: Vec<PageRecord>,
    pub metadata: DocumentMetadata,
    pub stats: ParseStats,
    /// Strategy the run actually used.
    pub strategy: Strategy,
    /// Provider used for escalated pages, if any were escalated.
    pub provider: Option<ProviderKind>,
}

impl ParseOutput {
    /// Mean classifier confidence across non-failed pages.
    pub fn mean_confidence(&self) -> f32 {
        let scored: Vec<f32> = self
            .pages
            .iter()
            .filter(|p| p.is_ok())
            .map(|p| p.confidence)
            .collect();
        if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f32>() / scored.len() as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page: usize, confidence: f32, error: Option<PageError>) -> PageRecord {
        PageRecord {
            page,
            text: "text".into(),
            source: ParseSource::Library,
            confidence,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 1,
            retries: 0,
            error,
        }
    }

    #[test]
    fn parse_source_serde_round_trip() {
        let ai = ParseSource::Ai(ProviderKind::Gemini);
        let json = serde_json::to_string(&ai).unwrap();
        assert_eq!(json, "\"ai:gemini\"");
        let back: ParseSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ai);

        let lib: ParseSource = serde_json::from_str("\"library\"").unwrap();
        assert_eq!(lib, ParseSource::Library);
    }

    #[test]
    fn mean_confidence_ignores_failed_pages() {
        let output = ParseOutput {
            text: String::new(),
            pages: vec![
                record(1, 0.9, None),
                record(2, 0.5, None),
                record(
                    3,
                    0.0,
                    Some(PageError::AiFailed {
                        page: 3,
                        retries: 3,
                        detail: "boom".into(),
                    }),
                ),
            ],
            metadata: DocumentMetadata::default(),
            stats: ParseStats::default(),
            strategy: Strategy::Auto,
            provider: None,
        };
        let mean = output.mean_confidence();
        assert!((mean - 0.7).abs() < 1e-6, "got {mean}");
    }

    #[test]
    fn mean_confidence_empty_is_zero() {
        let output = ParseOutput {
            text: String::new(),
            pages: vec![],
            metadata: DocumentMetadata::default(),
            stats: ParseStats::default(),
            strategy: Strategy::Library,
            provider: None,
        };
        assert_eq!(output.mean_confidence(), 0.0);
    }
}
