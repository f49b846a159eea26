//! Configuration types for a parse run.
//!
//! All behaviour is controlled through [`ParseConfig`], built via its
//! [`ParseConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to hold server-wide defaults in shared state, clone them per request, and
//! apply the request's form-field overrides on top.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::providers::{ProviderKind, VisionProvider};

/// How pages are routed between the library path and the AI path.
///
/// Matches the `strategy` multipart form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Library extraction first; escalate low-confidence pages to AI. (default)
    #[default]
    Auto,
    /// Library extraction only. Never calls a provider.
    Library,
    /// Escalate every selected page to AI.
    Ai,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Library => "library",
            Strategy::Ai => "ai",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "smart" => Ok(Strategy::Auto),
            "library" => Ok(Strategy::Library),
            "ai" | "llm" => Ok(Strategy::Ai),
            other => Err(ParseError::InvalidParameter(format!(
                "unknown strategy '{other}' (expected auto, library or ai)"
            ))),
        }
    }
}

/// Configuration for one parse run.
///
/// Built via [`ParseConfig::builder()`] or [`ParseConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_parser_pro::{ParseConfig, Strategy};
///
/// let config = ParseConfig::builder()
///     .strategy(Strategy::Auto)
///     .confidence_threshold(0.6)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// Dispatch strategy. Default: [`Strategy::Auto`].
    pub strategy: Strategy,

    /// Explicit provider choice. `None` means fall back through the
    /// configured-key order (openai → gemini → anthropic).
    pub provider_kind: Option<ProviderKind>,

    /// Pre-constructed provider. Takes precedence over `provider_kind`.
    /// Useful in tests and when the caller needs custom middleware.
    pub provider: Option<Arc<dyn VisionProvider>>,

    /// Model identifier override. `None` uses the provider default.
    pub model: Option<String>,

    /// Pages scoring below this escalate under [`Strategy::Auto`].
    /// Range 0.0–1.0. Default: 0.5.
    ///
    /// 0.0 disables escalation entirely; 1.0 escalates any page the
    /// classifier is not fully satisfied with.
    pub confidence_threshold: f32,

    /// Character count below which a page cannot reach a full length score.
    /// Default: 100.
    ///
    /// Pages of real prose rarely extract to fewer than 100 characters;
    /// scanned pages extract to zero or a handful of stray glyphs.
    pub min_chars: usize,

    /// Maximum rendered image dimension (width or height) in pixels for
    /// escalated pages. Default: 2000.
    ///
    /// A safety cap: an A0 poster rendered without one could produce a
    /// 13 000 × 18 000 px image and exhaust memory. Either dimension is
    /// capped and the other scales proportionally.
    pub max_rendered_pixels: u32,

    /// Number of concurrent provider calls. Default: 4.
    ///
    /// Vision APIs are network-bound; a small fan-out cuts wall-clock time
    /// on documents with many escalated pages without tripping rate limits.
    pub concurrency: usize,

    /// Maximum tokens the model may generate per page. Default: 4096.
    ///
    /// Dense pages (tables, listings) can exceed 2 000 output tokens;
    /// setting this too low silently truncates the page text.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants determinism, not creativity.
    pub temperature: f32,

    /// Maximum retry attempts on a transient provider failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s, so concurrent
    /// workers don't re-hammer a recovering endpoint in lockstep.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom extraction prompt. `None` uses the built-in default.
    pub prompt: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Per-provider-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            provider_kind: None,
            provider: None,
            model: None,
            confidence_threshold: 0.5,
            min_chars: 100,
            max_rendered_pixels: 2000,
            concurrency: 4,
            max_tokens: 4096,
            temperature: 0.0,
            max_retries: 3,
            retry_backoff_ms: 500,
            password: None,
            prompt: None,
            pages: PageSelection::default(),
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("strategy", &self.strategy)
            .field("provider_kind", &self.provider_kind)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .field("model", &self.model)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("min_chars", &self.min_chars)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .finish()
    }
}

impl ParseConfig {
    /// Create a new builder for `ParseConfig`.
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn provider_kind(mut self, kind: ProviderKind) -> Self {
        self.config.provider_kind = Some(kind);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn confidence_threshold(mut self, t: f32) -> Self {
        self.config.confidence_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn min_chars(mut self, n: usize) -> Self {
        self.config.min_chars = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, ParseError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.confidence_threshold) {
            return Err(ParseError::InvalidConfig(format!(
                "confidence threshold must be 0.0–1.0, got {}",
                c.confidence_threshold
            )));
        }
        if c.concurrency == 0 {
            return Err(ParseError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(ParseError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Parse all pages (default).
    #[default]
    All,
    /// Parse a single page (1-indexed).
    Single(usize),
    /// Parse a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Parse specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed
    /// page numbers, clipped to the document length.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Parse the `pages` form/CLI value: `all`, `5`, `3-15` or `1,3,5`.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim().to_lowercase();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: usize = start.trim().parse().map_err(|_| {
                ParseError::InvalidParameter(format!("invalid start page in range '{s}'"))
            })?;
            let end: usize = end.trim().parse().map_err(|_| {
                ParseError::InvalidParameter(format!("invalid end page in range '{s}'"))
            })?;
            if start < 1 || start > end {
                return Err(ParseError::InvalidParameter(format!(
                    "invalid page range '{start}-{end}': pages are 1-indexed and start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }

        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| {
                    p.trim().parse::<usize>().map_err(|_| {
                        ParseError::InvalidParameter(format!("invalid page number '{}'", p.trim()))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if pages.iter().any(|&p| p < 1) {
                return Err(ParseError::InvalidParameter(
                    "pages are 1-indexed, minimum is 1".into(),
                ));
            }
            return Ok(PageSelection::Set(pages));
        }

        let page: usize = s
            .parse()
            .map_err(|_| ParseError::InvalidParameter(format!("invalid page number '{s}'")))?;
        if page < 1 {
            return Err(ParseError::InvalidParameter(
                "pages are 1-indexed, minimum is 1".into(),
            ));
        }
        Ok(PageSelection::Single(page))
    }
}
