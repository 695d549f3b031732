//! Shared helpers for reading model responses

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Drop `<think>…</think>` deliberation that reasoning models emit before the answer
///
/// An unterminated `<think>` means the answer never started; everything after
/// it is dropped. A stray `</think>` with no opener (the template pre-filled
/// it) ends the reasoning; everything up to the last one is dropped.
pub fn strip_reasoning(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    let visible = match stripped.find("<think>") {
        Some(start) => &stripped[..start],
        None => &stripped[..],
    };
    let visible = match visible.rfind("</think>") {
        Some(end) => &visible[end + "</think>".len()..],
        None => visible,
    };
    visible.trim().to_string()
}

/// Extract JSON object from a response that might contain markdown or other text
///
/// Handles:
/// - ```json code blocks
/// - Plain ``` code blocks
/// - Raw JSON objects
pub fn extract_json_object(text: &str) -> Result<String, String> {
    // Try to find JSON in ```json blocks
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Ok(text[json_start..json_start + end].trim().to_string());
        }
    }

    // Try plain code blocks
    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        let content_start = text[block_start..]
            .find('\n')
            .map(|i| block_start + i + 1)
            .unwrap_or(block_start);
        if let Some(end) = text[content_start..].find("```") {
            let content = text[content_start..content_start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if end > start {
                return Ok(text[start..=end].to_string());
            }
        }
    }

    Err("No JSON object found in response".to_string())
}
