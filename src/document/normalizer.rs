//! Text Normalizer
//!
//! Turns raw extractor output into a single clean text stream:
//! - CRLF / CR become LF, page breaks become paragraph breaks
//! - words hyphenated across a line wrap are re-joined
//! - whitespace inside a paragraph collapses to single spaces
//! - paragraphs are separated by exactly one blank line
//!
//! Character order is preserved and the function is idempotent.

use super::parser::PAGE_BREAK;
use once_cell::sync::Lazy;
use regex::Regex;

/// A letter, a hyphen at the end of a line, then a lowercase continuation
static LINE_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").expect("valid regex"));

/// One or more blank lines (lines holding only whitespace count as blank)
static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[^\S\n]*\n\s*").expect("valid regex"));

/// Paragraph separator in normalized text
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Normalize raw extracted text. Returns `None` when nothing but whitespace is left.
pub fn normalize(raw: &str) -> Option<String> {
    let text = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(PAGE_BREAK, PARAGRAPH_SEPARATOR);

    let text = LINE_HYPHEN.replace_all(&text, "$1$2");

    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(&text)
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return None;
    }

    Some(paragraphs.join(PARAGRAPH_SEPARATOR))
}
