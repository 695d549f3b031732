//! Documents entering the pipeline
//!
//! A [`Document`] is produced once per run from extracted text and is never
//! mutated afterwards. Extraction lives in [`parser`], text cleanup in
//! [`normalizer`].

pub mod normalizer;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use normalizer::normalize;
pub use parser::{extract_text, RawText};

/// A paper ready for chunking
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Where the paper came from (URL or path)
    pub source: String,
    /// Raw text as it came out of the extractor
    pub raw_text: String,
    /// Number of pages the text was extracted from
    pub page_count: usize,
    /// When extraction happened
    pub extracted_at: DateTime<Utc>,
}

impl Document {
    /// Wrap extractor output
    pub fn new(source: impl Into<String>, raw: RawText) -> Self {
        Self {
            source: source.into(),
            raw_text: raw.text,
            page_count: raw.page_count,
            extracted_at: Utc::now(),
        }
    }

    /// Build a document straight from text (one page)
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            source,
            RawText {
                text: text.into(),
                page_count: 1,
            },
        )
    }
}
