//! Chunk Analyzer
//!
//! Builds the extraction prompt for one chunk, calls the model and parses the
//! reply into a [`ChunkAnalysis`]. Every failure (model error, unparseable
//! reply, timeout) is folded into a `failed` [`AnalysisRecord`]; nothing here
//! can abort the surrounding run.
//!
//! Parsing is tolerant:
//! - `<think>` blocks are stripped first
//! - labeled sections are matched in English or Chinese, with or without
//!   `#`, bold markers, numbering and trailing colons
//! - if no labeled section is found, a JSON object with the same four fields
//!   is accepted instead
//! - missing sections become empty fields

use super::types::{AnalysisRecord, Chunk, ChunkAnalysis, TermPair};
use crate::ai::prompts;
use crate::ai::utils::{extract_json_object, strip_reasoning};
use crate::ai::{ModelClient, Prompt};
use crate::config::PipelineConfig;
use crate::error::ChunkError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Leading list numbering such as `1.`, `2)` or `三、`
static NUMBERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+[.)]|[一二三四五六七八九十]+、)\s*").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    CoreIdea,
    KeyTerms,
    Findings,
    Limitations,
}

/// Accepted labels per section; longer labels first so prefixes don't shadow them
const SECTION_LABELS: &[(Section, &str)] = &[
    (Section::CoreIdea, "core idea"),
    (Section::CoreIdea, "main idea"),
    (Section::CoreIdea, "核心思想"),
    (Section::CoreIdea, "核心观点"),
    (Section::CoreIdea, "关键论点"),
    (Section::KeyTerms, "key technical terms"),
    (Section::KeyTerms, "key terms"),
    (Section::KeyTerms, "technical terms"),
    (Section::KeyTerms, "terminology"),
    (Section::KeyTerms, "关键术语"),
    (Section::KeyTerms, "专业术语"),
    (Section::Findings, "experimental findings"),
    (Section::Findings, "experimental data"),
    (Section::Findings, "experimental results"),
    (Section::Findings, "experiments"),
    (Section::Findings, "findings"),
    (Section::Findings, "实验数据"),
    (Section::Findings, "实验结果"),
    (Section::Findings, "实验发现"),
    (Section::Limitations, "limitations"),
    (Section::Limitations, "limitation"),
    (Section::Limitations, "局限性"),
    (Section::Limitations, "局限"),
];

/// Placeholder answers that mean "nothing here"
const EMPTY_MARKERS: &[&str] = &["none", "n/a", "na", "-", "not reported", "not mentioned", "无", "暂无"];

/// Turns chunks into analysis records
#[derive(Clone)]
pub struct ChunkAnalyzer {
    client: ModelClient,
    temperature: f32,
    timeout: Option<Duration>,
}

impl ChunkAnalyzer {
    pub fn new(client: ModelClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            temperature: config.chunk_temperature,
            timeout: config.chunk_timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze one chunk; never fails, failures land in the record
    pub async fn analyze(&self, source: &str, chunk: &Chunk, total: usize) -> AnalysisRecord {
        let prompt = Prompt::new(
            prompts::chunk_analysis_prompt(source, chunk.index + 1, total, &chunk.text),
            self.temperature,
        );

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(&prompt)).await {
                Ok(result) => result,
                Err(_) => Err(ChunkError::TimedOut(limit)),
            },
            None => self.run(&prompt).await,
        };

        match result {
            Ok(analysis) => {
                tracing::debug!(
                    chunk = chunk.index,
                    terms = analysis.key_terms.len(),
                    "[ChunkAnalyzer] Chunk analyzed"
                );
                AnalysisRecord::ok(chunk.index, analysis)
            }
            Err(e) => {
                tracing::warn!(chunk = chunk.index, "[ChunkAnalyzer] Chunk failed: {}", e);
                AnalysisRecord::failed(chunk.index, e)
            }
        }
    }

    async fn run(&self, prompt: &Prompt) -> Result<ChunkAnalysis, ChunkError> {
        let response = self.client.invoke(prompt).await?;
        parse_analysis(&response).map_err(ChunkError::ParseFailure)
    }
}

/// Parse a model reply into the four fields
pub fn parse_analysis(response: &str) -> Result<ChunkAnalysis, String> {
    let text = strip_reasoning(response);
    if text.is_empty() {
        return Err("empty response".to_string());
    }

    if let Some(analysis) = parse_sections(&text) {
        return if is_blank(&analysis) {
            Err("all sections are empty".to_string())
        } else {
            Ok(analysis)
        };
    }

    if let Some(analysis) = parse_json(&text) {
        return if is_blank(&analysis) {
            Err("all JSON fields are empty".to_string())
        } else {
            Ok(analysis)
        };
    }

    Err("no labeled sections found in response".to_string())
}

fn is_blank(analysis: &ChunkAnalysis) -> bool {
    analysis.core_idea.is_empty()
        && analysis.key_terms.is_empty()
        && analysis.experimental_findings.is_empty()
        && analysis.limitations.is_empty()
}

/// Markdown section parsing. `None` when no heading is recognized.
fn parse_sections(text: &str) -> Option<ChunkAnalysis> {
    let mut current: Option<Section> = None;
    let mut found_any = false;
    let mut core = Vec::new();
    let mut terms = Vec::new();
    let mut findings = Vec::new();
    let mut limits = Vec::new();

    for line in text.lines() {
        let content = match match_heading(line) {
            Some((section, inline)) => {
                current = Some(section);
                found_any = true;
                inline
            }
            None => line,
        };

        let bucket = match current {
            Some(Section::CoreIdea) => &mut core,
            Some(Section::KeyTerms) => &mut terms,
            Some(Section::Findings) => &mut findings,
            Some(Section::Limitations) => &mut limits,
            None => continue,
        };
        if !content.trim().is_empty() {
            bucket.push(content.trim_end());
        }
    }

    if !found_any {
        return None;
    }

    Some(ChunkAnalysis {
        core_idea: clean_field(&core.join("\n")),
        key_terms: terms.iter().filter_map(|l| parse_term_line(l)).collect(),
        experimental_findings: clean_field(&findings.join("\n")),
        limitations: clean_field(&limits.join("\n")),
    })
}

/// Recognize a section heading; returns the section and any inline content after a colon
fn match_heading(line: &str) -> Option<(Section, &str)> {
    let trimmed = line.trim();
    let had_hash = trimmed.starts_with('#');
    let body = trimmed.trim_start_matches('#').trim_start();
    let body = NUMBERING
        .find(body)
        .map_or(body, |m| &body[m.end()..]);
    let bolded = body.starts_with("**");
    let body = if bolded {
        body.trim_start_matches('*').trim_start()
    } else {
        body
    };

    for &(section, label) in SECTION_LABELS {
        let Some(prefix) = body.get(..label.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(label) {
            continue;
        }

        let after = body[label.len()..].trim_start_matches('*').trim_start();
        if let Some(inline) = after
            .strip_prefix(':')
            .or_else(|| after.strip_prefix('：'))
        {
            let inline = inline.trim().trim_start_matches('*').trim_end_matches('*').trim();
            return Some((section, inline));
        }
        if after.trim_matches('*').trim().is_empty() || had_hash || bolded {
            return Some((section, ""));
        }
    }
    None
}

fn clean_field(raw: &str) -> String {
    let text = raw.trim();
    let bare = text
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_end_matches('.')
        .trim_end_matches('。');
    if EMPTY_MARKERS.iter().any(|m| bare.eq_ignore_ascii_case(m)) {
        String::new()
    } else {
        text.to_string()
    }
}

/// Parse one line of the key-terms section
fn parse_term_line(line: &str) -> Option<TermPair> {
    let line = line.trim();
    // table separator rows like |---|---|
    if line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')) {
        return None;
    }
    let line = NUMBERING
        .find(line)
        .map_or(line, |m| &line[m.end()..]);
    let line = line
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_matches('|')
        .trim();
    let line = line.replace("**", "");
    let line = line.trim();

    if clean_field(line).is_empty() || line.eq_ignore_ascii_case("English Term | 中文术语") {
        return None;
    }

    let (a, b) = split_term(line);
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() {
        return None;
    }

    // keep the English side first
    if has_cjk(a) && !b.is_empty() && !has_cjk(b) {
        Some(TermPair::new(b, a))
    } else {
        Some(TermPair::new(a, b))
    }
}

fn split_term(line: &str) -> (&str, &str) {
    for sep in ["|", "，", ",", "：", ":", " \u{2014} ", " \u{2013} ", " - "] {
        if let Some((a, b)) = line.split_once(sep) {
            return (a, b.trim_matches('|'));
        }
    }
    for (open, close) in [('(', ')'), ('（', '）')] {
        if let (Some(start), true) = (line.find(open), line.ends_with(close)) {
            let inner = &line[start + open.len_utf8()..line.len() - close.len_utf8()];
            return (&line[..start], inner);
        }
    }
    (line, "")
}

fn has_cjk(s: &str) -> bool {
    s.chars().any(|c| ('\u{4E00}'..='\u{9FFF}').contains(&c))
}

/// JSON fallback: `{"core_idea": ..., "key_terms": [...], ...}`
fn parse_json(text: &str) -> Option<ChunkAnalysis> {
    let raw = extract_json_object(text).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let obj = value.as_object()?;

    let known = ["core_idea", "key_terms", "experimental_findings", "limitations"];
    if !known.iter().any(|k| obj.contains_key(*k)) {
        return None;
    }

    let field = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .map(clean_field)
            .unwrap_or_default()
    };

    let key_terms = obj
        .get("key_terms")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(json_term).collect())
        .unwrap_or_default();

    Some(ChunkAnalysis {
        core_idea: field("core_idea"),
        key_terms,
        experimental_findings: field("experimental_findings"),
        limitations: field("limitations"),
    })
}

fn json_term(item: &serde_json::Value) -> Option<TermPair> {
    match item {
        serde_json::Value::String(s) => parse_term_line(s),
        serde_json::Value::Array(pair) => {
            let term = pair.first()?.as_str()?.trim();
            let translation = pair.get(1).and_then(|v| v.as_str()).unwrap_or("").trim();
            (!term.is_empty()).then(|| TermPair::new(term, translation))
        }
        serde_json::Value::Object(map) => {
            let term = map
                .get("term")
                .or_else(|| map.get("en"))
                .and_then(|v| v.as_str())?
                .trim();
            let translation = map
                .get("translation")
                .or_else(|| map.get("zh"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim();
            (!term.is_empty()).then(|| TermPair::new(term, translation))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::testing::{client_for, FakeBackend};
    use crate::error::ModelError;
    use std::sync::Arc;

    const GOOD_REPLY: &str = "## Core Idea\nThe paper replaces recurrence with self-attention.\n\n## Key Terms\n- Self-Attention | 自注意力\n- Positional Encoding | 位置编码\n\n## Experimental Findings\n28.4 BLEU on WMT14 En-De.\n\n## Limitations\nQuadratic cost in sequence length.";

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            start: 0,
            end: text.len(),
            char_len: text.chars().count(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_full_reply() {
        let analysis = parse_analysis(GOOD_REPLY).unwrap();
        assert_eq!(
            analysis.core_idea,
            "The paper replaces recurrence with self-attention."
        );
        assert_eq!(
            analysis.key_terms,
            vec![
                TermPair::new("Self-Attention", "自注意力"),
                TermPair::new("Positional Encoding", "位置编码"),
            ]
        );
        assert_eq!(analysis.experimental_findings, "28.4 BLEU on WMT14 En-De.");
        assert_eq!(analysis.limitations, "Quadratic cost in sequence length.");
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let analysis = parse_analysis("## Core Idea\nOnly an idea here.").unwrap();
        assert_eq!(analysis.core_idea, "Only an idea here.");
        assert!(analysis.key_terms.is_empty());
        assert!(analysis.experimental_findings.is_empty());
        assert!(analysis.limitations.is_empty());
    }

    #[test]
    fn test_placeholder_values_are_empty() {
        let reply = "## Core Idea\nAn idea.\n## Experimental Findings\nNone.\n## Limitations\n无";
        let analysis = parse_analysis(reply).unwrap();
        assert!(analysis.experimental_findings.is_empty());
        assert!(analysis.limitations.is_empty());
    }

    #[test]
    fn test_reasoning_is_stripped_before_parsing() {
        let reply = format!("<think>\n## Limitations\nthinking out loud\n</think>\n{}", GOOD_REPLY);
        let analysis = parse_analysis(&reply).unwrap();
        assert_eq!(analysis.limitations, "Quadratic cost in sequence length.");
    }

    #[test]
    fn test_bold_inline_and_chinese_headings() {
        let reply = "**核心思想**：提出了一种残差结构。\n1. **关键术语**\n* 残差连接, Residual Connection\n**Limitations:** Needs large batches.";
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.core_idea, "提出了一种残差结构。");
        assert_eq!(
            analysis.key_terms,
            vec![TermPair::new("Residual Connection", "残差连接")]
        );
        assert_eq!(analysis.limitations, "Needs large batches.");
    }

    #[test]
    fn test_prose_mentioning_label_is_not_a_heading() {
        let reply = "## Core Idea\nLimitations of prior work motivate the design.";
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(
            analysis.core_idea,
            "Limitations of prior work motivate the design."
        );
        assert!(analysis.limitations.is_empty());
    }

    #[test]
    fn test_term_formats() {
        assert_eq!(
            parse_term_line("- Batch Normalization (批归一化)"),
            Some(TermPair::new("Batch Normalization", "批归一化"))
        );
        assert_eq!(
            parse_term_line("| Dropout | 随机失活 |"),
            Some(TermPair::new("Dropout", "随机失活"))
        );
        assert_eq!(
            parse_term_line("2. **Beam Search**: 束搜索"),
            Some(TermPair::new("Beam Search", "束搜索"))
        );
        assert_eq!(parse_term_line("- Transformer"), Some(TermPair::new("Transformer", "")));
        assert_eq!(parse_term_line("|---|---|"), None);
        assert_eq!(parse_term_line("- English Term | 中文术语"), None);
    }

    #[test]
    fn test_json_fallback() {
        let reply = r#"```json
{"core_idea": "Sparse experts scale capacity.", "key_terms": [["Mixture of Experts", "混合专家"], {"term": "Router", "translation": "路由器"}, "Gating | 门控"], "experimental_findings": "", "limitations": "Load imbalance."}
```"#;
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.core_idea, "Sparse experts scale capacity.");
        assert_eq!(analysis.key_terms.len(), 3);
        assert_eq!(analysis.key_terms[1], TermPair::new("Router", "路由器"));
        assert_eq!(analysis.limitations, "Load imbalance.");
    }

    #[test]
    fn test_unparseable_replies() {
        assert_eq!(parse_analysis("   ").unwrap_err(), "empty response");
        assert_eq!(parse_analysis("<think>hmm</think>").unwrap_err(), "empty response");
        assert!(parse_analysis("I cannot help with that.").is_err());
        assert!(parse_analysis("## Core Idea\n\n## Limitations\n").is_err());
    }

    #[tokio::test]
    async fn test_analyze_ok_record() {
        let backend = Arc::new(FakeBackend::with_responder(|_| Ok(GOOD_REPLY.to_string())));
        let analyzer = ChunkAnalyzer::new(client_for(backend.clone(), 3, 2), &PipelineConfig::default());

        let record = analyzer.analyze("arxiv:1706.03762", &chunk(1, "chunk text"), 3).await;

        assert_eq!(record.chunk_index, 1);
        assert!(record.analysis().is_some());
        let prompts = backend.prompts();
        assert!(prompts[0].text.contains("segment 2/3"));
        assert!(prompts[0].text.contains("chunk text"));
        assert_eq!(prompts[0].temperature, 0.4);
    }

    #[tokio::test]
    async fn test_analyze_parse_failure_record() {
        let backend = Arc::new(FakeBackend::with_responder(|_| Ok(String::new())));
        let analyzer = ChunkAnalyzer::new(client_for(backend, 3, 2), &PipelineConfig::default());

        let record = analyzer.analyze("src", &chunk(0, "x"), 1).await;
        assert_eq!(
            record.error(),
            Some(&ChunkError::ParseFailure("empty response".to_string()))
        );
    }

    #[tokio::test]
    async fn test_analyze_model_failure_record() {
        let backend = Arc::new(FakeBackend::with_responder(|_| {
            Err(ModelError::Transient("502 Bad Gateway".to_string()))
        }));
        let analyzer = ChunkAnalyzer::new(client_for(backend.clone(), 2, 2), &PipelineConfig::default());

        let record = analyzer.analyze("src", &chunk(0, "x"), 1).await;
        assert!(matches!(
            record.error(),
            Some(ChunkError::Model(ModelError::ExhaustedRetries { attempts: 2, .. }))
        ));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_analyze_timeout_record() {
        let backend = Arc::new(
            FakeBackend::with_responder(|_| Ok(GOOD_REPLY.to_string()))
                .with_latency(Duration::from_millis(200)),
        );
        let analyzer = ChunkAnalyzer::new(client_for(backend, 1, 1), &PipelineConfig::default())
            .with_timeout(Some(Duration::from_millis(10)));

        let record = analyzer.analyze("src", &chunk(0, "x"), 1).await;
        assert_eq!(
            record.error(),
            Some(&ChunkError::TimedOut(Duration::from_millis(10)))
        );
    }
}
