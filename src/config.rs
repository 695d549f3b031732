//! Process-wide configuration
//!
//! Resolved once at startup and threaded into each component by value.
//! Nothing in the library reads the environment on its own; the binary
//! loads `.env` with dotenvy and then calls [`PipelineConfig::from_env`].

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
pub const DEFAULT_MODEL_ID: &str = "deepseek-ai/DeepSeek-R1-Distill-Qwen-7B";

/// Smallest aggregation budget that still fits one rendered chunk record
const MIN_AGGREGATE_BUDGET: usize = 1000;

/// Immutable settings for the analysis pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_id: String,
    /// Pages extracted from each PDF
    pub max_pages: usize,
    /// Upper bound on chunk size, in characters
    pub max_chunk_chars: usize,
    /// How far back from the limit the chunker looks for a natural boundary
    pub chunk_lookback_chars: usize,
    /// Total attempts per model call (first call included)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Simultaneous in-flight model requests
    pub max_concurrency: usize,
    /// Optional bound on a whole chunk analysis, retries included
    pub chunk_timeout: Option<Duration>,
    /// Largest block payload the aggregator sends in one call. Counts the
    /// joined segment or part blocks only; the prompt template around them
    /// (about 1 KB) comes on top.
    pub aggregate_budget_chars: usize,
    pub max_aggregation_depth: u32,
    pub chunk_temperature: f32,
    pub summary_temperature: f32,
    pub max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_pages: 10,
            max_chunk_chars: 10_000,
            chunk_lookback_chars: 1_500,
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            request_timeout: Duration::from_secs(120),
            max_concurrency: 4,
            chunk_timeout: None,
            aggregate_budget_chars: 24_000,
            max_aggregation_depth: 3,
            chunk_temperature: 0.4,
            summary_temperature: 0.2,
            max_tokens: 16_384,
        }
    }
}

impl PipelineConfig {
    /// Build a config from `PAPER_DIGEST_*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable lookup (for tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("PAPER_DIGEST_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("PAPER_DIGEST_API_KEY"))?;

        if let Some(url) = lookup("PAPER_DIGEST_API_URL") {
            config.api_url = url;
        }
        if let Some(model) = lookup("PAPER_DIGEST_MODEL") {
            config.model_id = model;
        }
        if let Some(v) = lookup("PAPER_DIGEST_MAX_PAGES") {
            config.max_pages = parse_num("PAPER_DIGEST_MAX_PAGES", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_CHUNK_SIZE") {
            config.max_chunk_chars = parse_num("PAPER_DIGEST_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_CHUNK_LOOKBACK") {
            config.chunk_lookback_chars = parse_num("PAPER_DIGEST_CHUNK_LOOKBACK", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_MAX_ATTEMPTS") {
            config.max_attempts = parse_num("PAPER_DIGEST_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_BASE_DELAY_MS") {
            config.base_delay = Duration::from_millis(parse_num("PAPER_DIGEST_BASE_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("PAPER_DIGEST_BACKOFF_FACTOR") {
            config.backoff_factor = parse_num("PAPER_DIGEST_BACKOFF_FACTOR", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_num("PAPER_DIGEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("PAPER_DIGEST_CONCURRENCY") {
            config.max_concurrency = parse_num("PAPER_DIGEST_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_CHUNK_TIMEOUT_SECS") {
            let secs: u64 = parse_num("PAPER_DIGEST_CHUNK_TIMEOUT_SECS", &v)?;
            config.chunk_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = lookup("PAPER_DIGEST_AGGREGATE_BUDGET") {
            config.aggregate_budget_chars = parse_num("PAPER_DIGEST_AGGREGATE_BUDGET", &v)?;
        }
        if let Some(v) = lookup("PAPER_DIGEST_AGGREGATION_DEPTH") {
            config.max_aggregation_depth = parse_num("PAPER_DIGEST_AGGREGATION_DEPTH", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Missing("api_url"));
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::Missing("model_id"));
        }
        if self.max_pages == 0 {
            return Err(invalid("max_pages", "must be at least 1"));
        }
        if self.max_chunk_chars == 0 {
            return Err(invalid("max_chunk_chars", "must be at least 1"));
        }
        if self.chunk_lookback_chars >= self.max_chunk_chars {
            return Err(invalid(
                "chunk_lookback_chars",
                format!("must be smaller than max_chunk_chars ({})", self.max_chunk_chars),
            ));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(invalid("backoff_factor", "must be >= 1.0"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if self.aggregate_budget_chars < MIN_AGGREGATE_BUDGET {
            return Err(invalid(
                "aggregate_budget_chars",
                format!("must be at least {}", MIN_AGGREGATE_BUDGET),
            ));
        }
        Ok(())
    }
}

/// Paths and batch settings used by the command line front end
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory of `.txt` link files (first line = paper URL)
    pub input_dir: PathBuf,
    /// Cache directory for downloaded PDFs
    pub pdf_dir: PathBuf,
    /// Root of the report tree; reports land in `<result_dir>/<name>/{part,sum}`
    pub result_dir: PathBuf,
    /// `<name>` above; defaults to the input directory's name
    pub output_name: Option<String>,
    /// Documents analyzed at the same time
    pub parallel_documents: usize,
}

impl AppConfig {
    /// Directory that receives `part/` and `sum/` for this batch
    pub fn report_dir(&self) -> PathBuf {
        let name = self.output_name.clone().unwrap_or_else(|| {
            self.input_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "default".to_string())
        });
        self.result_dir.join(name)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./default"),
            pdf_dir: PathBuf::from("./pdfs"),
            result_dir: PathBuf::from("./result"),
            output_name: None,
            parallel_documents: 1,
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, format!("{:?}: {}", raw, e)))
}
