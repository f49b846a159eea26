//! Post-processing: deterministic cleanup of extracted page text.
//!
//! Both extraction paths leave recognisable artefacts. Vision models
//! occasionally wrap output in code fences despite being told not to;
//! library extraction carries Windows line endings, trailing whitespace and
//! invisible Unicode (zero-width spaces, soft hyphens, BOMs) straight out
//! of the content stream. Each rule here is a cheap pure function; keeping
//! them out of the prompt means the prompt stays focused on *what to read*,
//! not on formatting edge-cases.
//!
//! Rule order matters: fences are stripped before whitespace passes so the
//! fence detection sees the raw shape, and blank-line collapsing runs after
//! per-line trimming so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page's raw text.
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:text|markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode ─────────────────────────────────────

const INVISIBLE: &[char] = &[
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_model_fences() {
        let input = "```text\nInvoice #42\nTotal: $10\n```";
        assert_eq!(clean_text(input), "Invoice #42\nTotal: $10");
        // fences inside the text are left alone
        let inner = "before\n```\ncode\n```";
        assert_eq!(clean_text(inner), inner);
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn trims_trailing_whitespace() {
        assert_eq!(clean_text("line one   \nline two\t"), "line one\nline two");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        // a single blank line is preserved
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn removes_invisible_junk() {
        let input = "he\u{200B}llo\u{FEFF} wor\u{00AD}ld";
        assert_eq!(clean_text(input), "hello world");
    }

    #[test]
    fn trims_outer_whitespace() {
        assert_eq!(clean_text("\n\n  hello  \n\n"), "hello");
        assert_eq!(clean_text(""), "");
    }
}
