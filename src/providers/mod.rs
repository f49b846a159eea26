//! AI-vision providers.
//!
//! Defines the provider trait and the three vendor implementations used for
//! escalated pages. Each provider receives a rasterised page image and
//! returns the text it reads on it; everything else (retries, timeouts,
//! fallback between providers) lives above this layer so the clients stay
//! thin wire adapters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::pipeline::encode::EncodedPage;

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// One of the three supported AI-vision vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Anthropic,
}

impl ProviderKind {
    /// All kinds, in the configured fallback order (cheapest adequate first
    /// is a request-level choice; this order is the auto-detection order).
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this vendor's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Default vision model per vendor. Cheap, fast models — page text
    /// extraction does not need the flagship tiers.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4.1-nano",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Anthropic => "claude-haiku-4-20250514",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(ParseError::InvalidParameter(format!(
                "unknown provider '{other}' (expected openai, gemini or anthropic)"
            ))),
        }
    }
}

/// Per-call parameters forwarded to the vendor API.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    /// Extraction instructions (see [`crate::prompts`]).
    pub prompt: &'a str,
    /// Maximum tokens the model may generate for the page.
    pub max_tokens: usize,
    /// Sampling temperature. Low values keep the model faithful to the page.
    pub temperature: f32,
}

/// Text extracted from one page image by a provider.
#[derive(Debug, Clone)]
pub struct VisionExtraction {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub model: String,
}

/// A vision-capable AI provider.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Which vendor this is.
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent to the vendor.
    fn model(&self) -> &str;

    /// Read the text on a rasterised page image.
    async fn extract_text(
        &self,
        page: &EncodedPage,
        request: &VisionRequest<'_>,
    ) -> Result<VisionExtraction, ParseError>;
}

/// Construct a provider client for `kind`.
pub fn build_provider(
    kind: ProviderKind,
    api_key: impl Into<String>,
    model: Option<&str>,
    client: reqwest::Client,
) -> Arc<dyn VisionProvider> {
    let model = model.unwrap_or_else(|| kind.default_model()).to_string();
    match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, api_key.into(), model)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(client, api_key.into(), model)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(client, api_key.into(), model)),
    }
}

// ── Shared wire helpers ──────────────────────────────────────────────────

/// Map a reqwest transport error to [`ParseError::ApiError`] (status `None`,
/// so the retry policy treats it as transient).
pub(crate) fn transport_error(kind: ProviderKind, err: reqwest::Error) -> ParseError {
    ParseError::ApiError {
        provider: kind.as_str().to_string(),
        status: None,
        message: err.to_string(),
    }
}

/// Classify a non-2xx vendor response into the error taxonomy.
///
/// 401/403 → [`ParseError::AuthError`], 429 → [`ParseError::RateLimited`]
/// (honouring `Retry-After` when the vendor sends it), everything else →
/// [`ParseError::ApiError`] with the status attached so `is_retryable()`
/// can distinguish 4xx from 5xx.
pub(crate) async fn error_for_response(
    kind: ProviderKind,
    response: reqwest::Response,
) -> ParseError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let snippet = body_snippet(&body);

    match status.as_u16() {
        401 | 403 => ParseError::AuthError {
            provider: kind.as_str().to_string(),
            detail: snippet,
        },
        429 => ParseError::RateLimited {
            provider: kind.as_str().to_string(),
            retry_after_secs: retry_after,
        },
        code => ParseError::ApiError {
            provider: kind.as_str().to_string(),
            status: Some(code),
            message: format!("HTTP {code}: {snippet}"),
        },
    }
}

/// Vendor error bodies can be kilobytes of JSON; keep logs and client
/// responses readable.
fn body_snippet(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

// ── Test support ─────────────────────────────────────────────────────────

/// Scripted provider for exercising the retry/fallback machinery without a
/// network.
#[cfg(test)]
pub(crate) struct MockProvider {
    kind: ProviderKind,
    script: parking_lot::Mutex<std::collections::VecDeque<Result<VisionExtraction, ParseError>>>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(
        kind: ProviderKind,
        script: Vec<Result<VisionExtraction, ParseError>>,
    ) -> Self {
        Self {
            kind,
            script: parking_lot::Mutex::new(script.into_iter().collect()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn ok(text: &str) -> Result<VisionExtraction, ParseError> {
        Ok(VisionExtraction {
            text: text.to_string(),
            input_tokens: 10,
            output_tokens: 5,
            model: "mock".to_string(),
        })
    }
}

#[cfg(test)]
#[async_trait]
impl VisionProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn extract_text(
        &self,
        _page: &EncodedPage,
        _request: &VisionRequest<'_>,
    ) -> Result<VisionExtraction, ParseError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ParseError::Internal("mock script exhausted".into())))
    }
}
