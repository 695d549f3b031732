//! Document Parser Module
//!
//! Pure Rust text extraction for downloaded papers.
//!
//! ## Supported Formats
//! - PDF: page-by-page extraction via pdf-extract, capped at `max_pages`
//! - Text: .txt, .md (direct read, counted as one page)
//!
//! Pages are joined with a form feed so the normalizer can turn page
//! breaks into paragraph breaks.

use crate::error::PipelineError;
use std::path::Path;

/// Page-break marker placed between extracted pages
pub const PAGE_BREAK: char = '\u{000C}';

/// Text pulled out of a source file
#[derive(Debug, Clone, PartialEq)]
pub struct RawText {
    pub text: String,
    pub page_count: usize,
}

/// Extract raw text from the first `max_pages` pages of a document
pub fn extract_text(path: &Path, max_pages: usize) -> Result<RawText, PipelineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase());

    match ext.as_deref() {
        Some("pdf") => extract_pdf(path, max_pages),
        Some("txt") | Some("md") => read_plain_text(path),
        _ => Err(unreadable(path, format!("unsupported file type: {:?}", ext))),
    }
}

fn read_plain_text(path: &Path) -> Result<RawText, PipelineError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| unreadable(path, format!("failed to read text file: {}", e)))?;

    tracing::debug!(
        "[DocumentParser] Direct read: {} chars from {}",
        text.chars().count(),
        path.display()
    );

    Ok(RawText {
        text,
        page_count: 1,
    })
}

/// Extract text from a PDF using pdf-extract
/// Wrapped in catch_unwind to handle panics from malformed PDFs
fn extract_pdf(path: &Path, max_pages: usize) -> Result<RawText, PipelineError> {
    tracing::info!("[DocumentParser] Starting PDF extraction: {}", path.display());

    let bytes = std::fs::read(path)
        .map_err(|e| unreadable(path, format!("failed to read PDF file: {}", e)))?;

    tracing::debug!("[DocumentParser] PDF file size: {} bytes", bytes.len());

    // pdf_extract (and its font parsers) can panic on certain fonts/glyphs
    let pages = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })) {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            tracing::warn!(
                "[DocumentParser] PDF extraction FAILED for {}: {}",
                path.display(),
                e
            );
            return Err(unreadable(path, format!("PDF extraction failed: {}", e)));
        }
        Err(_panic) => {
            tracing::error!(
                "[DocumentParser] PDF extraction PANICKED for {} - likely malformed font/glyph",
                path.display()
            );
            return Err(unreadable(
                path,
                "PDF extraction panicked - likely contains malformed fonts",
            ));
        }
    };

    let total_pages = pages.len();
    let kept = join_pages(pages.into_iter().take(max_pages));

    tracing::info!(
        "[DocumentParser] PDF SUCCESS: {} chars from {}/{} pages of {}",
        kept.text.chars().count(),
        kept.page_count,
        total_pages,
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(kept)
}

/// Join page texts with the page-break marker
fn join_pages<I>(pages: I) -> RawText
where
    I: IntoIterator<Item = String>,
{
    let mut text = String::new();
    let mut page_count = 0;
    for page in pages {
        if page_count > 0 {
            text.push(PAGE_BREAK);
        }
        text.push_str(&page);
        page_count += 1;
    }
    RawText { text, page_count }
}

fn unreadable(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::UnreadablePdf {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_join_pages_inserts_page_breaks() {
        let raw = join_pages(vec!["one".to_string(), "two".to_string(), "three".to_string()]);
        assert_eq!(raw.page_count, 3);
        assert_eq!(raw.text, "one\u{000C}two\u{000C}three");
    }

    #[test]
    fn test_join_pages_respects_take() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let raw = join_pages(pages.into_iter().take(2));
        assert_eq!(raw.page_count, 2);
        assert_eq!(raw.text, "a\u{000C}b");
    }

    #[test]
    fn test_plain_text_is_read_directly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Attention is all you need.").unwrap();

        let raw = extract_text(&path, 10).unwrap();
        assert_eq!(raw.page_count, 1);
        assert!(raw.text.contains("Attention"));
    }

    #[test]
    fn test_corrupt_pdf_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = extract_text(&path, 10).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadablePdf { .. }));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = extract_text(Path::new("/nonexistent/paper.pdf"), 10).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadablePdf { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(Path::new("paper.docx"), 10).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }
}
