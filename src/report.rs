//! Report Emitter
//!
//! Renders a finished run as two markdown files:
//! - `part/<stem>.md`: every chunk in order, with its fields or its failure
//! - `sum/<stem>.md`: the aggregated summary, or why there is none

use crate::error::PipelineError;
use crate::pipeline::{AnalysisOutcome, AnalysisRecord, RunReport, SummaryOutcome, SummaryRecord};
use std::path::{Path, PathBuf};

pub const PART_DIR: &str = "part";
pub const SUM_DIR: &str = "sum";

fn source_line(source: &str) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        format!("**Source:** <{}>", source)
    } else {
        format!("**Source:** `{}`", source)
    }
}

/// Per-chunk report; lists every record, ok or failed
pub fn render_part_report(title: &str, source: &str, records: &[AnalysisRecord]) -> String {
    let ok = records.iter().filter(|r| r.analysis().is_some()).count();
    let mut out = format!(
        "# {} (segment analysis)\n\n{}\n\n{} segments, {} analyzed, {} failed\n",
        title,
        source_line(source),
        records.len(),
        ok,
        records.len() - ok
    );

    for record in records {
        out.push_str(&format!("\n### Segment {}\n\n", record.chunk_index + 1));
        match &record.outcome {
            AnalysisOutcome::Ok(analysis) => out.push_str(&analysis.render_fields()),
            AnalysisOutcome::Failed(e) => out.push_str(&format!("**Analysis failed:** {}", e)),
        }
        out.push('\n');
    }
    out
}

/// Whole-paper report
pub fn render_sum_report(title: &str, source: &str, summary: &SummaryRecord) -> String {
    let body = match &summary.outcome {
        SummaryOutcome::Ok(text) => text.clone(),
        SummaryOutcome::Failed(e) => format!("**Aggregation could not be performed:** {}", e),
    };
    format!(
        "# {} (summary)\n\n{}\n\n{}\n",
        title,
        source_line(source),
        body
    )
}

/// Paths of the two files written for one document
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub part: PathBuf,
    pub sum: PathBuf,
}

/// Write both reports under `result_dir`, creating `part/` and `sum/` as needed
pub async fn write_reports(
    result_dir: &Path,
    stem: &str,
    part: &str,
    sum: &str,
) -> Result<ReportPaths, PipelineError> {
    let paths = ReportPaths {
        part: result_dir.join(PART_DIR).join(format!("{}.md", stem)),
        sum: result_dir.join(SUM_DIR).join(format!("{}.md", stem)),
    };

    for (path, contents) in [(&paths.part, part), (&paths.sum, sum)] {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    }

    tracing::info!(
        "[ReportEmitter] Wrote {} and {}",
        paths.part.display(),
        paths.sum.display()
    );
    Ok(paths)
}

/// Render and write both reports for a finished run
pub async fn emit(
    result_dir: &Path,
    stem: &str,
    run: &RunReport,
) -> Result<ReportPaths, PipelineError> {
    let part = render_part_report(stem, &run.document.source, &run.records);
    let sum = render_sum_report(stem, &run.document.source, &run.summary);
    write_reports(result_dir, stem, &part, &sum).await
}
