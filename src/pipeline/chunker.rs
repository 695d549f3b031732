//! Chunker
//!
//! Splits normalized text into ordered chunks of at most `max_chars`
//! characters. Each cut is placed at the latest natural boundary inside the
//! lookback window `[limit - lookback, limit]`, trying in order:
//!
//! 1. paragraph boundary (right after a blank line)
//! 2. sentence boundary (after `.` `!` `?` plus whitespace, or after `。！？`)
//! 3. any whitespace
//! 4. the hard character limit
//!
//! Chunks are exact slices: concatenating them in order gives the input back.

use super::types::Chunk;

/// Boundary kinds, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Whitespace,
}

const BOUNDARY_PREFERENCE: [Boundary; 3] =
    [Boundary::Paragraph, Boundary::Sentence, Boundary::Whitespace];

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chars: usize,
    lookback_chars: usize,
}

impl Chunker {
    /// `max_chars` is clamped to at least 1; `lookback_chars` to below `max_chars`
    pub fn new(max_chars: usize, lookback_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            lookback_chars: lookback_chars.min(max_chars - 1),
        }
    }

    /// Split `text` into chunks. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        // byte offset of each char position, plus the end of the string
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = if chars.len() - start <= self.max_chars {
                chars.len()
            } else {
                self.find_cut(&chars, start)
            };

            let (byte_start, byte_end) = (offsets[start], offsets[end]);
            chunks.push(Chunk {
                index: chunks.len(),
                start: byte_start,
                end: byte_end,
                char_len: end - start,
                text: text[byte_start..byte_end].to_string(),
            });
            start = end;
        }

        tracing::debug!(
            "[Chunker] {} chars -> {} chunks (max {})",
            chars.len(),
            chunks.len(),
            self.max_chars
        );

        chunks
    }

    /// Char position to cut at; always in `(start, start + max_chars]`
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.max_chars;
        let floor = (limit - self.lookback_chars).max(start + 1);

        for kind in BOUNDARY_PREFERENCE {
            if let Some(cut) = (floor..=limit).rev().find(|&c| is_boundary(chars, c, kind)) {
                return cut;
            }
        }
        limit
    }
}

/// Whether cutting before position `cut` lands on a boundary of `kind`
fn is_boundary(chars: &[char], cut: usize, kind: Boundary) -> bool {
    let prev = |back: usize| cut.checked_sub(back).and_then(|i| chars.get(i)).copied();

    match kind {
        Boundary::Paragraph => prev(1) == Some('\n') && prev(2) == Some('\n'),
        Boundary::Sentence => {
            matches!(prev(1), Some('。' | '！' | '？'))
                || (prev(1).is_some_and(char::is_whitespace)
                    && matches!(prev(2), Some('.' | '!' | '?')))
        }
        Boundary::Whitespace => prev(1).is_some_and(char::is_whitespace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn assert_invariants(text: &str, chunks: &[Chunk], max: usize) {
        assert_eq!(reconstruct(chunks), text, "reconstruction");
        let total: usize = chunks.iter().map(|c| c.char_len).sum();
        assert_eq!(total, text.chars().count(), "no loss");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.char_len > 0, "empty chunk {}", i);
            assert!(chunk.char_len <= max, "chunk {} has {} chars", i, chunk.char_len);
            assert_eq!(chunk.char_len, chunk.text.chars().count());
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "contiguous");
        }
    }

    /// Paragraphs of ~sentence-sized prose totalling exactly `len` chars
    fn paper_text(len: usize) -> String {
        let sentence = "The proposed encoder improves accuracy on every benchmark we tried. ";
        let mut text = String::new();
        let mut n = 0;
        while text.chars().count() < len {
            text.push_str(sentence);
            n += 1;
            if n % 6 == 0 {
                text.push_str("\n\n");
            }
        }
        text.chars().take(len).collect()
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunks = Chunker::new(10_000, 1_500).split("A short abstract.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short abstract.");
    }

    #[test]
    fn test_exact_limit_is_single_chunk() {
        let text = "x".repeat(100);
        let chunks = Chunker::new(100, 10).split(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(Chunker::new(100, 10).split("").is_empty());
    }

    #[test]
    fn test_25k_document_with_10k_limit() {
        let text = paper_text(25_000);
        let chunks = Chunker::new(10_000, 1_500).split(&text);

        assert_eq!(chunks.len(), 3);
        assert_invariants(&text, &chunks, 10_000);
        // cuts land on natural boundaries, not the hard limit
        assert!(chunks[0].char_len < 10_000);
        assert!(chunks[0].text.ends_with("\n\n") || chunks[0].text.ends_with(". "));
    }

    #[test]
    fn test_prefers_paragraph_over_later_sentence() {
        let text = "Para one ends here.\n\nPara two. More words. Even more words here";
        let chunks = Chunker::new(40, 30).split(text);
        assert_eq!(chunks[0].text, "Para one ends here.\n\n");
        assert_invariants(text, &chunks, 40);
    }

    #[test]
    fn test_sentence_boundary_when_no_paragraph() {
        let text = "First sentence. Second sentence is longer than the rest";
        let chunks = Chunker::new(30, 20).split(text);
        assert_eq!(chunks[0].text, "First sentence. ");
        assert_invariants(text, &chunks, 30);
    }

    #[test]
    fn test_decimal_point_is_not_sentence_boundary() {
        let text = "Accuracy rose to 93.5 percent on the test split overall";
        let chunks = Chunker::new(24, 10).split(text);
        // whitespace fallback, never between "93." and "5"
        assert!(!chunks[0].text.ends_with("93."));
        assert_invariants(text, &chunks, 24);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "a".repeat(250);
        let chunks = Chunker::new(100, 20).split(&text);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.char_len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_invariants(&text, &chunks, 100);
    }

    #[test]
    fn test_boundary_outside_lookback_is_ignored() {
        // only space is at position 5, far from the limit of 50
        let text = format!("short {}", "b".repeat(120));
        let chunks = Chunker::new(50, 10).split(&text);
        assert_eq!(chunks[0].char_len, 50);
        assert_invariants(&text, &chunks, 50);
    }

    #[test]
    fn test_multibyte_text_is_measured_in_chars() {
        let text = "深度学习模型在多个基准上取得了显著提升。我们提出了一种新的注意力机制。".repeat(20);
        let chunks = Chunker::new(50, 20).split(&text);
        assert_invariants(&text, &chunks, 50);
        assert!(chunks.iter().all(|c| c.text.ends_with('。') || c.index == chunks.len() - 1));
    }

    #[test]
    fn test_tiny_limit_never_emits_empty_chunks() {
        let text = "a b\n\nc. d";
        let chunks = Chunker::new(1, 5).split(text);
        assert_eq!(chunks.len(), text.chars().count());
        assert_invariants(text, &chunks, 1);
    }

    #[test]
    fn test_invariants_across_sizes() {
        let text = paper_text(7_321);
        for max in [1, 2, 7, 64, 500, 1_000, 7_320, 7_321, 20_000] {
            let chunks = Chunker::new(max, max / 3).split(&text);
            assert_invariants(&text, &chunks, max);
        }
    }
}
