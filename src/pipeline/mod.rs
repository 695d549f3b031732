//! Document analysis pipeline
//!
//! ```text
//! Document ──► normalize ──► Chunker ──► ChunkAnalyzer × N (parallel) ──► barrier ──► Aggregator
//!                                            │ (bounded by the shared limiter)
//!                                            └─ each chunk settles as ok or failed
//! ```
//!
//! Run states: `Normalizing → Chunking → AnalyzingChunks → Aggregating → Done`,
//! with `Aborted` reachable from `Normalizing` (empty document) and from
//! `Aggregating` (no usable chunks or a failed summary call).

pub mod aggregator;
pub mod analyzer;
pub mod chunker;
pub mod types;

pub use aggregator::Aggregator;
pub use analyzer::ChunkAnalyzer;
pub use chunker::Chunker;
pub use types::{
    AnalysisOutcome, AnalysisRecord, AnalysisStatus, Chunk, ChunkAnalysis, SummaryOutcome,
    SummaryRecord, TermPair,
};

use crate::ai::ModelClient;
use crate::config::PipelineConfig;
use crate::document::{normalize, Document};
use crate::error::{ChunkError, PipelineError};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Normalizing,
    Chunking,
    AnalyzingChunks,
    Aggregating,
    Done,
    Aborted,
}

impl RunStage {
    /// Allowed transitions of the run state machine
    pub fn can_advance_to(self, next: RunStage) -> bool {
        use RunStage::*;
        matches!(
            (self, next),
            (Normalizing, Chunking)
                | (Chunking, AnalyzingChunks)
                | (AnalyzingChunks, Aggregating)
                | (Aggregating, Done)
                | (Normalizing, Aborted)
                | (Aggregating, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Done | RunStage::Aborted)
    }
}

/// Progress message sent once per settled chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    pub completed: usize,
    pub total: usize,
    pub chunk_index: usize,
    pub status: AnalysisStatus,
}

/// Everything one run produced, handed to the report emitter
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub document: Document,
    pub normalized_text: String,
    pub chunks: Vec<Chunk>,
    /// One per chunk, in chunk order
    pub records: Vec<AnalysisRecord>,
    pub summary: SummaryRecord,
    pub stage: RunStage,
    pub stage_history: Vec<RunStage>,
}

impl RunReport {
    pub fn ok_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status() == AnalysisStatus::Ok)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.len() - self.ok_count()
    }
}

/// Stage bookkeeping for one run
struct RunState {
    run_id: Uuid,
    stage: RunStage,
    history: Vec<RunStage>,
}

impl RunState {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stage: RunStage::Normalizing,
            history: vec![RunStage::Normalizing],
        }
    }

    fn advance(&mut self, next: RunStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        tracing::debug!(run = %self.run_id, "[Pipeline] {:?} -> {:?}", self.stage, next);
        self.stage = next;
        self.history.push(next);
    }
}

/// Runs documents through normalize → chunk → analyze → aggregate.
///
/// Cheap to clone; clones share the model client and its limiter, so several
/// documents can be analyzed at once under one in-flight bound.
#[derive(Clone)]
pub struct Pipeline {
    chunker: Chunker,
    analyzer: ChunkAnalyzer,
    aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, client: ModelClient) -> Self {
        Self {
            chunker: Chunker::new(config.max_chunk_chars, config.chunk_lookback_chars),
            analyzer: ChunkAnalyzer::new(client.clone(), config),
            aggregator: Aggregator::new(client, config),
        }
    }

    pub async fn analyze_document(&self, document: Document) -> Result<RunReport, PipelineError> {
        self.analyze_with_progress(document, None).await
    }

    /// Analyze one document. Only an empty document is an `Err`; chunk and
    /// summary failures are reported inside the returned records.
    ///
    /// Progress updates never block the run: when `progress` is full or its
    /// receiver is gone, the update is dropped.
    pub async fn analyze_with_progress(
        &self,
        document: Document,
        progress: Option<mpsc::Sender<ChunkProgress>>,
    ) -> Result<RunReport, PipelineError> {
        let mut state = RunState::new(Uuid::new_v4());
        tracing::info!(
            run = %state.run_id,
            source = %document.source,
            pages = document.page_count,
            "[Pipeline] Starting analysis"
        );

        let Some(normalized_text) = normalize(&document.raw_text) else {
            state.advance(RunStage::Aborted);
            tracing::error!(run = %state.run_id, "[Pipeline] Aborted: {} has no text", document.source);
            return Err(PipelineError::EmptyDocument(document.source));
        };

        state.advance(RunStage::Chunking);
        let chunks = self.chunker.split(&normalized_text);
        tracing::info!(
            run = %state.run_id,
            chars = normalized_text.chars().count(),
            chunks = chunks.len(),
            "[Pipeline] Document chunked"
        );

        state.advance(RunStage::AnalyzingChunks);
        let records = self
            .analyze_chunks(&document.source, &chunks, progress)
            .await;

        state.advance(RunStage::Aggregating);
        let summary = self.aggregator.aggregate(&document.source, &records).await;

        if summary.is_ok() {
            state.advance(RunStage::Done);
        } else {
            state.advance(RunStage::Aborted);
        }

        let report = RunReport {
            run_id: state.run_id,
            document,
            normalized_text,
            chunks,
            records,
            summary,
            stage: state.stage,
            stage_history: state.history,
        };
        tracing::info!(
            run = %report.run_id,
            ok = report.ok_count(),
            failed = report.failed_count(),
            stage = ?report.stage,
            "[Pipeline] Run finished"
        );
        Ok(report)
    }

    /// Fan out one task per chunk and wait for all of them to settle
    async fn analyze_chunks(
        &self,
        source: &str,
        chunks: &[Chunk],
        progress: Option<mpsc::Sender<ChunkProgress>>,
    ) -> Vec<AnalysisRecord> {
        let total = chunks.len();
        let source: Arc<str> = Arc::from(source);
        let mut tasks = FuturesUnordered::new();

        for chunk in chunks.iter().cloned() {
            let analyzer = self.analyzer.clone();
            let source = Arc::clone(&source);
            let index = chunk.index;
            let handle = tokio::spawn(async move {
                analyzer.analyze(&source, &chunk, total).await
            });
            tasks.push(async move { (index, handle.await) });
        }

        let mut slots: Vec<Option<AnalysisRecord>> = vec![None; total];
        let mut completed = 0;

        while let Some((index, joined)) = tasks.next().await {
            completed += 1;
            let record = match joined {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(chunk = index, "[Pipeline] Chunk task join error: {}", e);
                    AnalysisRecord::failed(index, ChunkError::TaskFailed(e.to_string()))
                }
            };
            let status = record.status();
            slots[index] = Some(record);

            tracing::debug!("[Pipeline] Progress: {}/{} chunks settled", completed, total);
            if let Some(sender) = &progress {
                let update = ChunkProgress {
                    completed,
                    total,
                    chunk_index: index,
                    status,
                };
                if sender.try_send(update).is_err() {
                    tracing::debug!("[Pipeline] Progress receiver full or closed, update dropped");
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    AnalysisRecord::failed(index, ChunkError::TaskFailed("missing result".to_string()))
                })
            })
            .collect()
    }
}
