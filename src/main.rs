//! paper-digest command line
//!
//! ```text
//! paper-digest [--path DIR] [--name NAME] [--pdf-dir DIR] [--result-dir DIR] [--parallel-docs N]
//! paper-digest --file paper.pdf [--url URL]
//! ```

use clap::Parser;
use futures::stream::{self, StreamExt};
use paper_digest::ai::ModelClient;
use paper_digest::document::{extract_text, Document};
use paper_digest::{report, source, AppConfig, Pipeline, PipelineConfig, PipelineError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "paper-digest")]
#[command(version, about = "Segment-by-segment analysis and summaries of research papers", long_about = None)]
struct Cli {
    /// Directory of link files (.txt, first line is the paper URL)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Name of the output directory under --result-dir
    #[arg(long)]
    name: Option<String>,

    /// Cache directory for downloaded PDFs
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    /// Root directory for reports
    #[arg(long)]
    result_dir: Option<PathBuf>,

    /// Analyze one local PDF or text file instead of a link directory
    #[arg(long, conflicts_with = "path")]
    file: Option<PathBuf>,

    /// Source URL recorded in the reports for --file
    #[arg(long, requires = "file")]
    url: Option<String>,

    /// Documents analyzed at the same time
    #[arg(long)]
    parallel_docs: Option<usize>,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        let defaults = AppConfig::default();
        AppConfig {
            input_dir: self.path.clone().unwrap_or(defaults.input_dir),
            pdf_dir: self.pdf_dir.clone().unwrap_or(defaults.pdf_dir),
            result_dir: self.result_dir.clone().unwrap_or(defaults.result_dir),
            output_name: self.name.clone(),
            parallel_documents: self
                .parallel_docs
                .unwrap_or(defaults.parallel_documents)
                .max(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    paper_digest::load_dotenv();
    paper_digest::init_tracing();

    let cli = Cli::parse();
    let app = cli.app_config();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("[Main] Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match ModelClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("[Main] {}", e);
            return ExitCode::FAILURE;
        }
    };
    let pipeline = Pipeline::new(&config, client);

    let result = match &cli.file {
        Some(file) => {
            let source = cli
                .url
                .clone()
                .unwrap_or_else(|| file.display().to_string());
            let stem = file_stem(file);
            analyze_file(&pipeline, &config, &app, file, &source, &stem).await
        }
        None => run_batch(&pipeline, &config, &app).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[Main] {}", e);
            ExitCode::FAILURE
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paper".to_string())
}

/// Process every link file in the input directory; per-paper failures are logged
async fn run_batch(
    pipeline: &Pipeline,
    config: &PipelineConfig,
    app: &AppConfig,
) -> Result<(), PipelineError> {
    let files = source::list_link_files(&app.input_dir).await?;
    if files.is_empty() {
        tracing::warn!("[Main] No link files in {}", app.input_dir.display());
        return Ok(());
    }
    tokio::fs::create_dir_all(&app.pdf_dir).await?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| PipelineError::Download {
            url: "https://arxiv.org".to_string(),
            reason: format!("Failed to create HTTP client: {}", e),
        })?;

    let total = files.len();
    tracing::info!("[Main] {} papers to process from {}", total, app.input_dir.display());

    let failures = stream::iter(files.into_iter().enumerate())
        .map(|(i, link_file)| {
            let http = &http;
            async move {
                tracing::info!("[Main] Paper {}/{}: {}", i + 1, total, link_file.display());
                let outcome = process_link_file(pipeline, config, app, http, &link_file).await;
                if let Err(e) = &outcome {
                    tracing::error!("[Main] {} failed: {}", link_file.display(), e);
                }
                outcome.is_err()
            }
        })
        .buffer_unordered(app.parallel_documents)
        .filter(|failed| futures::future::ready(*failed))
        .count()
        .await;

    tracing::info!("[Main] Done: {} succeeded, {} failed", total - failures, failures);
    Ok(())
}

async fn process_link_file(
    pipeline: &Pipeline,
    config: &PipelineConfig,
    app: &AppConfig,
    http: &reqwest::Client,
    link_file: &Path,
) -> Result<(), PipelineError> {
    let url = source::read_link_file(link_file).await?;
    let arxiv_id = source::extract_arxiv_id(&url)?;
    let pdf_path = app.pdf_dir.join(format!("{}.pdf", arxiv_id));
    source::download_pdf(http, &source::arxiv_pdf_url(&arxiv_id), &pdf_path).await?;

    analyze_file(pipeline, config, app, &pdf_path, &url, &file_stem(link_file)).await
}

async fn analyze_file(
    pipeline: &Pipeline,
    config: &PipelineConfig,
    app: &AppConfig,
    path: &Path,
    source: &str,
    stem: &str,
) -> Result<(), PipelineError> {
    let max_pages = config.max_pages;
    let owned = path.to_path_buf();
    let raw = tokio::task::spawn_blocking(move || extract_text(&owned, max_pages))
        .await
        .map_err(|e| PipelineError::UnreadablePdf {
            path: path.to_path_buf(),
            reason: format!("extraction task failed: {}", e),
        })??;

    let run = pipeline.analyze_document(Document::new(source, raw)).await?;
    let paths = report::emit(&app.report_dir(), stem, &run).await?;

    println!("Segment report: {}", paths.part.display());
    println!("Summary report: {}", paths.sum.display());
    Ok(())
}
