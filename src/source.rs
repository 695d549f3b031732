//! Paper sources
//!
//! The glue between a directory of link files and a PDF on disk:
//! - a link file is a `.txt` whose first line is the paper URL
//! - arXiv abs/pdf URLs are reduced to their id (version suffix kept)
//! - PDFs are streamed into the cache directory and reused on later runs

use crate::error::PipelineError;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

static ARXIV_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"arxiv\.org/(?:abs|pdf)/([\d.v]+)").expect("valid regex"));

/// Pull the arXiv id out of an abs or pdf URL
pub fn extract_arxiv_id(url: &str) -> Result<String, PipelineError> {
    let id = ARXIV_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|id| id.chars().any(|c| c.is_ascii_digit()))
        .ok_or_else(|| PipelineError::InvalidSource(url.to_string()))?;
    Ok(id.to_string())
}

pub fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{}.pdf", id)
}

/// First non-empty line of a link file, trimmed
pub async fn read_link_file(path: &Path) -> Result<String, PipelineError> {
    let contents = tokio::fs::read_to_string(path).await?;
    contents
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidSource(format!("{} is empty", path.display())))
}

/// `.txt` link files directly inside `dir`, sorted by name
pub async fn list_link_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if is_txt && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Download `url` to `dest` unless a non-empty file is already there
///
/// The body is streamed into `<dest>.part` and renamed on completion, so an
/// interrupted download never looks like a cached PDF. The `.part` file is
/// removed when any step after the request fails.
pub async fn download_pdf(client: &Client, url: &str, dest: &Path) -> Result<PathBuf, PipelineError> {
    if let Ok(meta) = tokio::fs::metadata(dest).await {
        if meta.is_file() && meta.len() > 0 {
            tracing::info!("[Source] Using cached {}", dest.display());
            return Ok(dest.to_path_buf());
        }
    }

    let download_err = |reason: String| PipelineError::Download {
        url: url.to_string(),
        reason,
    };

    tracing::info!("[Source] Downloading {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(download_err(format!("HTTP {}", status)));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = dest.with_extension("pdf.part");

    let saved = match write_body(response, &partial, url).await {
        Ok(bytes) => tokio::fs::rename(&partial, dest)
            .await
            .map(|_| bytes)
            .map_err(PipelineError::from),
        Err(e) => Err(e),
    };
    let downloaded = match saved {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    tracing::info!(
        "[Source] Saved {} ({} bytes)",
        dest.display(),
        downloaded
    );
    Ok(dest.to_path_buf())
}

/// Stream the response body into `partial`, returning the byte count
async fn write_body(
    response: reqwest::Response,
    partial: &Path,
    url: &str,
) -> Result<u64, PipelineError> {
    let total = response.content_length().filter(|n| *n > 0);
    let mut file = tokio::fs::File::create(partial).await?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_logged = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PipelineError::Download {
            url: url.to_string(),
            reason: format!("stream error: {}", e),
        })?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total {
            let percent = downloaded * 100 / total;
            if percent >= last_logged + 10 || downloaded == total {
                last_logged = percent;
                tracing::debug!("[Source] Download progress: {}%", percent);
            }
        }
    }

    file.flush().await?;
    Ok(downloaded)
}
