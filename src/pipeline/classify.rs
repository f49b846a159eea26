//! Per-page extraction-confidence scoring.
//!
//! Library extraction fails in recognisable ways: scanned pages extract to
//! nothing, pages with broken font encodings extract to replacement glyphs
//! or private-use-area codepoints, and damaged content streams produce
//! word-shaped noise. The classifier condenses those signals into a single
//! score in [0, 1]; the dispatcher escalates pages scoring below the
//! configured threshold.
//!
//! The score is deliberately cheap — string scans only, no rendering — so
//! classifying a 500-page document costs microseconds per page.

use crate::config::Strategy;

/// Score the library-extracted text of one page.
///
/// Components:
/// * **length** — characters relative to `min_chars`; a page of real prose
///   rarely extracts below ~100 characters, a scan extracts to nothing.
/// * **readability** — share of glyphs that are alphanumeric or ordinary
///   punctuation.
/// * **junk** — replacement characters, stray control codes and
///   private-use-area glyphs (symptoms of a failed font decode) subtract
///   directly from the score.
/// * **word shape** — a single unbroken blob or a spray of one-character
///   tokens halves the score even when the glyphs themselves look fine.
pub fn score_page(text: &str, min_chars: usize) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let glyphs: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if glyphs.is_empty() {
        return 0.0;
    }
    let total = glyphs.len() as f32;

    let readable = glyphs.iter().filter(|c| is_readable(**c)).count() as f32;
    let junk = glyphs.iter().filter(|c| is_junk(**c)).count() as f32;

    let length_score = (glyphs.len() as f32 / min_chars.max(1) as f32).min(1.0);
    let readable_ratio = readable / total;
    let junk_ratio = junk / total;

    let mut score = 0.6 * length_score + 0.4 * readable_ratio - junk_ratio;
    if word_shape_is_suspect(trimmed) {
        score *= 0.4;
    }
    score.clamp(0.0, 1.0)
}

/// Whether a page takes the AI path under the given strategy.
pub fn needs_escalation(strategy: Strategy, score: f32, threshold: f32) -> bool {
    match strategy {
        Strategy::Library => false,
        Strategy::Ai => true,
        Strategy::Auto => score < threshold,
    }
}

fn is_readable(c: char) -> bool {
    c.is_alphanumeric() || ".,;:!?()'\"-–—/\\%$€£&@#*+=[]<>©®°".contains(c)
}

fn is_junk(c: char) -> bool {
    c == '\u{FFFD}'
        || (c.is_control() && c != '\n' && c != '\r' && c != '\t')
        || ('\u{E000}'..='\u{F8FF}').contains(&c)
}

/// Detect degenerate tokenisation: one giant unbroken run, or text shredded
/// into single characters. Both happen when a content stream decodes to the
/// wrong glyph widths.
fn word_shape_is_suspect(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return true;
    }
    let mean_len =
        tokens.iter().map(|t| t.chars().count()).sum::<usize>() as f32 / tokens.len() as f32;
    mean_len > 20.0 || (tokens.len() > 5 && mean_len < 1.5)
}
