//! Extraction prompts for the AI-vision fallback.
//!
//! Centralising every prompt here keeps a single source of truth and lets
//! unit tests inspect prompts without spinning up a real provider. Callers
//! can override via [`crate::config::ParseConfig::prompt`]; the constant
//! here is used only when no override is provided.

/// Default instructions for reading a page image back as plain text.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are a precise document transcriber. Read the attached page image and return its text.

Follow these rules:

1. Transcribe ALL visible text completely and accurately, in natural reading order.
2. Preserve paragraph breaks with blank lines. Keep list items on their own lines.
3. Render tables row by row, separating cells with " | ".
4. Do not describe images, logos or decorations; transcribe only text.
5. Do not add commentary, headings of your own, or "Page X" markers.
6. Do not wrap the output in code fences.
7. If the page contains no text at all, return an empty response."#;
