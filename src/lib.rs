//! Chunked research-paper analysis.
//!
//! A paper is extracted, normalized and cut into bounded chunks; each chunk is
//! analyzed by a remote model in parallel, and the per-chunk analyses are
//! folded into one summary. See [`pipeline`] for the flow.

pub mod ai;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod source;

pub use config::{AppConfig, PipelineConfig};
pub use error::{ChunkError, ConfigError, ModelError, PipelineError, SummaryError};
pub use pipeline::{Pipeline, RunReport};

use tracing_subscriber::EnvFilter;

/// Load `.env` from the working directory, falling back to the parent directory
pub fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }
}

/// Install the global subscriber
///
/// Default: warn for dependencies, info for this crate (stage transitions and
/// per-document results). `RUST_LOG=paper_digest=debug` shows per-chunk and
/// per-attempt detail.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,paper_digest=info")),
        )
        .init();
}
