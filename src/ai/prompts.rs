//! Prompt templates
//!
//! Templates are plain functions of their inputs so the same chunk always
//! produces the same prompt. The section headings requested here are the
//! ones the chunk analyzer parses back out.

/// Section headings requested from the model, in order
pub const HEADING_CORE_IDEA: &str = "Core Idea";
pub const HEADING_KEY_TERMS: &str = "Key Terms";
pub const HEADING_FINDINGS: &str = "Experimental Findings";
pub const HEADING_LIMITATIONS: &str = "Limitations";

/// Per-chunk extraction prompt
pub fn chunk_analysis_prompt(source: &str, position: usize, total: usize, chunk: &str) -> String {
    format!(
        r#"You are a senior computer science researcher. Analyze the following excerpt of a research paper (source: {source}, segment {position}/{total}).

----- BEGIN EXCERPT -----
{chunk}
----- END EXCERPT -----

Answer with exactly these four markdown sections, in this order, and nothing else:

## {core}
Two to four sentences stating the central claim or idea of this excerpt (method principle, result, argument).

## {terms}
One bullet per important technical term, pairing the English term with its Chinese translation:
- English Term | 中文术语

## {findings}
Datasets, metrics and quantitative results reported in this excerpt. Leave the section empty if there are none.

## {limits}
Limitations, assumptions or open problems stated or clearly implied in this excerpt. Leave the section empty if there are none.

RULES:
1. Only use information present in this excerpt; do not speculate about other parts of the paper.
2. Explain the variables of any formula you mention.
3. Mark contested claims with "(needs cross-check)"."#,
        source = source,
        position = position,
        total = total,
        chunk = chunk,
        core = HEADING_CORE_IDEA,
        terms = HEADING_KEY_TERMS,
        findings = HEADING_FINDINGS,
        limits = HEADING_LIMITATIONS,
    )
}

/// Intermediate prompt: condense one group of segment analyses
pub fn group_summary_prompt(source: &str, group: usize, groups: usize, blocks: &str) -> String {
    format!(
        r#"You are condensing part {group}/{groups} of the segment-by-segment analysis of a research paper (source: {source}).

----- SEGMENT ANALYSES -----
{blocks}
----- END -----

Merge these analyses into one condensed analysis that keeps, in original order:
- the core ideas and how they connect
- every key technical term with its translation (English Term | 中文术语)
- all experimental findings with their numbers
- all stated limitations

Do not add information that is not in the analyses above."#,
        source = source,
        group = group,
        groups = groups,
        blocks = blocks,
    )
}

/// Final prompt: one coherent summary of the whole paper
pub fn final_summary_prompt(source: &str, blocks: &str) -> String {
    format!(
        r#"You are a domain expert. Using the segment analyses below, write a single coherent review of the paper (source: {source}).

----- SEGMENT ANALYSES -----
{blocks}
----- END -----

Structure the review with these sections:

### 1. Overall Contribution
The problem addressed, the limits of existing approaches, and what this paper contributes.

### 2. Method
The core technique, its key steps, and the most important formulas with the meaning of their variables.

### 3. Findings
Experimental setup, main results with numbers, and whether they support the central claims.

### 4. Limitations and Outlook
Main weaknesses of the method or the evaluation, and promising follow-up directions.

### 5. Terminology
The key technical terms as a list: English Term | 中文术语

RULES:
1. Attribute every number to the findings it came from.
2. Mark conclusions that the analyses do not fully support as "(hypothesis)"."#,
        source = source,
        blocks = blocks,
    )
}
