//! Error taxonomy for the analysis pipeline
//!
//! Errors are split by how far they propagate:
//! - `ModelError` / `ChunkError` are contained inside a single chunk's record
//! - `SummaryError` is contained inside the summary record
//! - `PipelineError` aborts a whole document run

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a remote model call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Network failure, timeout or rate limit; safe to retry
    #[error("transient model error: {0}")]
    Transient(String),

    /// Authentication or invalid request; retrying will not help
    #[error("fatal model error: {0}")]
    Fatal(String),

    /// Every attempt failed with a transient error
    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<ModelError> },
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_))
    }
}

/// Why a single chunk has no analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChunkError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model answered but nothing usable could be read from it
    #[error("could not parse model response: {0}")]
    ParseFailure(String),

    #[error("chunk analysis timed out after {0:?}")]
    TimedOut(Duration),

    /// The worker task panicked or was cancelled
    #[error("analysis task failed: {0}")]
    TaskFailed(String),
}

/// Why a document has no aggregated summary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SummaryError {
    #[error("no usable chunks: every chunk analysis failed")]
    NoUsableChunks,

    #[error("aggregation call failed: {0}")]
    Model(#[from] ModelError),
}

/// Errors that abort a document run before any report can be produced
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("document {0} contains no text")]
    EmptyDocument(String),

    #[error("unreadable PDF {path:?}: {reason}")]
    UnreadablePdf { path: PathBuf, reason: String },

    #[error("invalid paper source {0}")]
    InvalidSource(String),

    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Invalid or missing configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
