//! Prompt construction and response salvage for the three agents.

use crate::models::QuestionType;
use crate::retrieval::Grounding;
use serde::{Deserialize, Serialize};

/// Named set of phrasing conventions applied by the crafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleProfile {
    /// Direct question about a single fact or relationship
    DirectRecall,
    /// Several statements, the candidate judges which hold
    MultiStatementTruth,
}

impl StyleProfile {
    /// Default profile for a question type.
    pub fn default_for(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::TrueFalse | QuestionType::McqMultiple => Self::MultiStatementTruth,
            QuestionType::McqSingle | QuestionType::ShortAnswer => Self::DirectRecall,
        }
    }

    /// Phrasing conventions injected into the craft prompt.
    pub fn conventions(&self) -> &'static str {
        match self {
            Self::DirectRecall => {
                "Ask directly about one fact or relationship from the concept. \
                 Keep the stem to a single sentence where possible."
            }
            Self::MultiStatementTruth => {
                "Present one or more declarative statements derived from the concept \
                 and ask which of them hold. Statements must be individually \
                 verifiable against the source excerpt."
            }
        }
    }
}

impl std::fmt::Display for StyleProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectRecall => f.write_str("direct_recall"),
            Self::MultiStatementTruth => f.write_str("multi_statement_truth"),
        }
    }
}

/// Combine per-question groundings into the single blob the extractor sees.
pub fn combine_groundings(groundings: &[Grounding]) -> String {
    groundings
        .iter()
        .map(|g| format!("[Source: {}]\n{}", g.source_title, g.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Prompt for the concept extractor.
pub fn extract_prompt(blob: &str, count: usize) -> String {
    format!(
        r#"You are an exam content analyst. Read the reference text below and identify {count} distinct, testable concepts.

Reference text:
{blob}

For each concept provide:
- "claim": a short testable statement of the concept
- "excerpt": the verbatim supporting sentence(s) copied exactly from the reference text

Rules:
- Excerpts must be copied character-for-character from the reference text. Never paraphrase.
- Concepts must be distinct from each other.
- Respond with a JSON array only, no commentary:
[{{"claim": "...", "excerpt": "..."}}]"#
    )
}

fn option_constraint(question_type: QuestionType) -> String {
    match question_type.required_options() {
        Some(n) => format!(
            "- Provide exactly {n} options. The correct answer(s) must be the full \
             content of an option, never a label like \"A\" or \"option 2\"."
        ),
        None => "- This is a free-text question: provide no options and give the \
                 expected answer text."
            .to_string(),
    }
}

/// Prompt for the question crafter.
pub fn craft_prompt(
    claim: &str,
    excerpt: &str,
    question_type: QuestionType,
    difficulty: u8,
    style: StyleProfile,
    languages: &[String],
) -> String {
    let langs = languages.join(", ");
    format!(
        r#"You are an exam question writer. Write one {question_type} question testing this concept.

Concept: {claim}
Supporting excerpt: {excerpt}

Style: {style}. {conventions}

Constraints:
- Target difficulty: {difficulty} on a 1-5 scale.
{options}
- Provide the question text, each option, and the explanation in every one of these languages: {langs}. Use the language code as the JSON key.
- Never refer to "the passage", "the text above", or any source material in the question itself; the candidate will not see it.

Respond with a JSON object only:
{{"text": {{"en": "..."}}, "options": [{{"en": "..."}}], "answers": ["full option content"], "explanation": {{"en": "..."}}, "difficulty": {difficulty}}}"#,
        conventions = style.conventions(),
        options = option_constraint(question_type),
    )
}

/// Prompt for the reviewer.
pub fn review_prompt(
    question_text: &str,
    options: &[String],
    answers: &[String],
    explanation: &str,
    excerpt: &str,
) -> String {
    let options_block = if options.is_empty() {
        "(no options)".to_string()
    } else {
        options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}. {}", i + 1, o))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are an exam quality reviewer. Judge the question below against its source excerpt.

Question: {question_text}
Options:
{options_block}
Stated correct answer(s): {answers}
Explanation: {explanation}

Source excerpt: {excerpt}

Assess:
1. Is the stated answer actually correct given the excerpt?
2. Are any distractors implausible, ambiguous, or accidentally correct?
3. Does the stated difficulty fit? If not, give a revised 1-5 rating.

Respond with a JSON object only:
{{"score": 0.0, "feedback": "...", "difficulty": null}}
where score is 0.0-1.0 and difficulty is a revised 1-5 rating or null to keep the current one."#,
        answers = answers.join("; "),
    )
}

/// Salvage a JSON payload from completion output.
///
/// Models wrap JSON in fenced code blocks or prose despite instructions;
/// this trims to the outermost array or object.
pub fn salvage_json(content: &str) -> &str {
    let trimmed = content.trim();

    // Prefer a fenced block when present.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    let open = trimmed.find(['[', '{']);
    let close = trimmed.rfind([']', '}']);
    match (open, close) {
        (Some(o), Some(c)) if c >= o => trimmed[o..=c].trim(),
        _ => trimmed,
    }
}
