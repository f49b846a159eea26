//! # pdf-parser-pro
//!
//! Smart PDF parsing: deterministic library extraction per page, with
//! low-confidence pages escalated to an AI-vision provider (OpenAI, Google
//! Gemini or Anthropic Claude).
//!
//! ## Why this crate?
//!
//! Sending every page of every PDF to a vision model works, but it is slow
//! and it costs real money. Most pages of most documents extract perfectly
//! with a PDF library for free. The trick is knowing *which* pages didn't —
//! scans, broken font encodings, damaged content streams — and paying for
//! AI only there. In practice the library path answers roughly nine pages
//! in ten.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract   per-page library text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 2. Classify  score each page's extraction confidence
//!  ├─ 3. Dispatch  strategy: auto / library / ai
//!  ├─ 4. Escalate  rasterise low-confidence pages → base64 PNG → provider
//!  ├─ 5. Polish    deterministic text cleanup
//!  └─ 6. Output    assembled text + per-page records + cost stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_parser_pro::{parse, ParseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / GEMINI_API_KEY / ANTHROPIC_API_KEY
//!     let config = ParseConfig::default();
//!     let output = parse("document.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!(
//!         "{} library pages, {} ai pages, ~${:.4}",
//!         output.stats.library_pages, output.stats.ai_pages, output.stats.estimated_cost_usd
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Running the server
//!
//! The `pdfpro` binary (feature `cli`, on by default) serves the same
//! pipeline over HTTP: `POST /parse-smart/` with multipart fields `file`,
//! `strategy`, `llm_provider` and `pages`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageSelection, ParseConfig, ParseConfigBuilder, Strategy};
pub use error::{PageError, ParseError};
pub use keys::KeyStore;
pub use metrics::{ParseTracker, TrackerSnapshot};
pub use output::{DocumentMetadata, PageRecord, ParseOutput, ParseSource, ParseStats};
pub use parse::{inspect, parse, parse_from_bytes};
pub use providers::{ProviderKind, VisionProvider};
pub use server::{router, run, AppState};
