//! Records produced by a pipeline run

use crate::ai::prompts::{
    HEADING_CORE_IDEA, HEADING_FINDINGS, HEADING_KEY_TERMS, HEADING_LIMITATIONS,
};
use crate::error::{ChunkError, SummaryError};
use serde::Serialize;

/// A bounded, contiguous slice of a document's normalized text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// 0-based position within the document
    pub index: usize,
    /// Byte offset of the first character in the normalized text
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Length in characters
    pub char_len: usize,
    pub text: String,
}

/// A technical term with its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermPair {
    pub term: String,
    /// Empty when the model gave no translation
    pub translation: String,
}

impl TermPair {
    pub fn new(term: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            translation: translation.into(),
        }
    }
}

/// The four extracted fields for one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkAnalysis {
    pub core_idea: String,
    pub key_terms: Vec<TermPair>,
    /// Empty when the chunk reports no experiments
    pub experimental_findings: String,
    /// Empty when the chunk states no limitations
    pub limitations: String,
}

impl ChunkAnalysis {
    /// Markdown body with the four labeled fields; empty fields read "None reported."
    pub fn render_fields(&self) -> String {
        let or_none = |s: &str| {
            if s.is_empty() {
                "None reported.".to_string()
            } else {
                s.to_string()
            }
        };

        let terms = if self.key_terms.is_empty() {
            "None reported.".to_string()
        } else {
            self.key_terms
                .iter()
                .map(|t| {
                    if t.translation.is_empty() {
                        format!("- {}", t.term)
                    } else {
                        format!("- {} | {}", t.term, t.translation)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "**{}:** {}\n\n**{}:**\n{}\n\n**{}:** {}\n\n**{}:** {}",
            HEADING_CORE_IDEA,
            or_none(&self.core_idea),
            HEADING_KEY_TERMS,
            terms,
            HEADING_FINDINGS,
            or_none(&self.experimental_findings),
            HEADING_LIMITATIONS,
            or_none(&self.limitations),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    Failed,
}

/// Result of analyzing one chunk: the fields, or the last error seen
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Ok(ChunkAnalysis),
    Failed(ChunkError),
}

/// One per chunk, in chunk order
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub chunk_index: usize,
    pub outcome: AnalysisOutcome,
}

impl AnalysisRecord {
    pub fn ok(chunk_index: usize, analysis: ChunkAnalysis) -> Self {
        Self {
            chunk_index,
            outcome: AnalysisOutcome::Ok(analysis),
        }
    }

    pub fn failed(chunk_index: usize, error: ChunkError) -> Self {
        Self {
            chunk_index,
            outcome: AnalysisOutcome::Failed(error),
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        match self.outcome {
            AnalysisOutcome::Ok(_) => AnalysisStatus::Ok,
            AnalysisOutcome::Failed(_) => AnalysisStatus::Failed,
        }
    }

    pub fn analysis(&self) -> Option<&ChunkAnalysis> {
        match &self.outcome {
            AnalysisOutcome::Ok(analysis) => Some(analysis),
            AnalysisOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ChunkError> {
        match &self.outcome {
            AnalysisOutcome::Ok(_) => None,
            AnalysisOutcome::Failed(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Ok(String),
    Failed(SummaryError),
}

/// The aggregated analysis for a whole document
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub outcome: SummaryOutcome,
    /// Ok chunk records the summary was built from
    pub chunks_used: usize,
    /// Model calls spent on aggregation
    pub model_calls: usize,
    /// Grouping levels above the final call (0 = single call)
    pub levels: u32,
}

impl SummaryRecord {
    pub fn failed(error: SummaryError, chunks_used: usize, model_calls: usize, levels: u32) -> Self {
        Self {
            outcome: SummaryOutcome::Failed(error),
            chunks_used,
            model_calls,
            levels,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            SummaryOutcome::Ok(text) => Some(text),
            SummaryOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SummaryError> {
        match &self.outcome {
            SummaryOutcome::Ok(_) => None,
            SummaryOutcome::Failed(e) => Some(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SummaryOutcome::Ok(_))
    }
}
