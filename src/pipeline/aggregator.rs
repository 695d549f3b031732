//! Hierarchical Aggregator
//!
//! Folds the ok analysis records of one document into a single summary.
//!
//! ```text
//! blocks (one per ok record, chunk order)
//!   │
//!   ├─ fits budget, single block, or depth cap reached ──► final call ──► summary
//!   │
//!   └─ otherwise: greedy in-order packing into groups ≤ budget
//!        └─ one intermediate call per group ──► group summaries become the new blocks
//! ```
//!
//! Each level only re-summarizes; no ok record is ever left out of the input
//! of the level above it.

use super::types::{AnalysisRecord, ChunkAnalysis, SummaryOutcome, SummaryRecord};
use crate::ai::prompts::{final_summary_prompt, group_summary_prompt};
use crate::ai::utils::strip_reasoning;
use crate::ai::{ModelClient, Prompt};
use crate::config::PipelineConfig;
use crate::error::SummaryError;
use futures::future::join_all;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Heading + fields for one ok chunk record
pub fn render_block(chunk_index: usize, analysis: &ChunkAnalysis) -> String {
    format!("### Segment {}\n{}", chunk_index + 1, analysis.render_fields())
}

#[derive(Clone)]
pub struct Aggregator {
    client: ModelClient,
    budget_chars: usize,
    max_depth: u32,
    temperature: f32,
}

impl Aggregator {
    pub fn new(client: ModelClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            budget_chars: config.aggregate_budget_chars,
            max_depth: config.max_aggregation_depth,
            temperature: config.summary_temperature,
        }
    }

    /// Build the summary record. Failed records are skipped; if none are ok
    /// no model call is made.
    pub async fn aggregate(&self, source: &str, records: &[AnalysisRecord]) -> SummaryRecord {
        let mut usable: Vec<(usize, &ChunkAnalysis)> = records
            .iter()
            .filter_map(|r| r.analysis().map(|a| (r.chunk_index, a)))
            .collect();
        usable.sort_by_key(|(index, _)| *index);

        let chunks_used = usable.len();
        if chunks_used == 0 {
            tracing::warn!(
                records = records.len(),
                "[Aggregator] No usable chunks, skipping aggregation"
            );
            return SummaryRecord::failed(SummaryError::NoUsableChunks, 0, 0, 0);
        }

        let mut blocks: Vec<String> = usable
            .into_iter()
            .map(|(index, analysis)| render_block(index, analysis))
            .collect();
        let mut level = 0u32;
        let mut calls = 0usize;

        loop {
            if blocks.len() == 1
                || level >= self.max_depth
                || joined_len(&blocks) <= self.budget_chars
            {
                calls += 1;
                tracing::info!(
                    blocks = blocks.len(),
                    level,
                    "[Aggregator] Final summary call"
                );
                let prompt = Prompt::new(
                    final_summary_prompt(source, &blocks.join(BLOCK_SEPARATOR)),
                    self.temperature,
                );
                return match self.client.invoke(&prompt).await {
                    Ok(text) => SummaryRecord {
                        outcome: SummaryOutcome::Ok(strip_reasoning(&text)),
                        chunks_used,
                        model_calls: calls,
                        levels: level,
                    },
                    Err(e) => {
                        tracing::error!("[Aggregator] Final summary failed: {}", e);
                        SummaryRecord::failed(SummaryError::Model(e), chunks_used, calls, level)
                    }
                };
            }

            let groups = pack_groups(&blocks, self.budget_chars);
            let total = groups.len();
            tracing::info!(
                blocks = blocks.len(),
                groups = total,
                level,
                "[Aggregator] Input over budget, summarizing groups"
            );

            let calls_for_level = groups.iter().enumerate().map(|(i, group)| {
                let prompt = Prompt::new(
                    group_summary_prompt(source, i + 1, total, &group.join(BLOCK_SEPARATOR)),
                    self.temperature,
                );
                async move { self.client.invoke(&prompt).await }
            });
            let results = join_all(calls_for_level).await;
            calls += total;
            level += 1;

            let mut next = Vec::with_capacity(total);
            for (i, result) in results.into_iter().enumerate() {
                match result {
                    Ok(text) => next.push(format!("### Part {}\n{}", i + 1, strip_reasoning(&text))),
                    Err(e) => {
                        tracing::error!(group = i + 1, "[Aggregator] Group summary failed: {}", e);
                        return SummaryRecord::failed(
                            SummaryError::Model(e),
                            chunks_used,
                            calls,
                            level,
                        );
                    }
                }
            }
            blocks = next;
        }
    }
}

/// Length in chars of the blocks joined with the separator. This is what the
/// budget is checked against; prompt template text is not included.
fn joined_len(blocks: &[String]) -> usize {
    let content: usize = blocks.iter().map(|b| b.chars().count()).sum();
    content + BLOCK_SEPARATOR.len() * blocks.len().saturating_sub(1)
}

/// Greedy in-order packing. A block larger than the budget gets a group of its own.
fn pack_groups(blocks: &[String], budget: usize) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut size = 0;

    for block in blocks {
        let len = block.chars().count();
        let grown = size + BLOCK_SEPARATOR.len() + len;
        if !current.is_empty() && grown > budget {
            groups.push(std::mem::take(&mut current));
            size = 0;
        }
        size = if current.is_empty() { len } else { size + BLOCK_SEPARATOR.len() + len };
        current.push(block.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
