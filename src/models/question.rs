//! Question model and multilingual text support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default/fallback language for multilingual fields.
pub const DEFAULT_LANG: &str = "en";

/// Typed mapping from language code to text, with fallback resolution.
///
/// Lookup order: requested language, then [`DEFAULT_LANG`], then any entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LangText(pub BTreeMap<String, String>);

impl LangText {
    /// Build a single-language text in the default language.
    pub fn from_default(text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_LANG.to_string(), text.into());
        Self(map)
    }

    /// Insert or replace the text for a language.
    pub fn set(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        self.0.insert(lang.into(), text.into());
    }

    /// Resolve text for a language with fallback.
    pub fn resolve(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.get(DEFAULT_LANG))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    /// Text in the default language, falling back to any entry.
    pub fn default_text(&self) -> &str {
        self.resolve(DEFAULT_LANG).unwrap_or("")
    }

    /// Whether no language carries any text.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|t| t.trim().is_empty())
    }

    /// Language codes present.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Supported question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Multiple choice, exactly one correct option
    McqSingle,
    /// Multiple choice, one or more correct options
    McqMultiple,
    /// Binary true/false
    TrueFalse,
    /// Free-text short answer, no options
    ShortAnswer,
}

impl QuestionType {
    /// Number of options a crafted question of this type must carry.
    pub fn required_options(&self) -> Option<usize> {
        match self {
            Self::McqSingle | Self::McqMultiple => Some(4),
            Self::TrueFalse => Some(2),
            Self::ShortAnswer => None,
        }
    }

    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::McqSingle => "mcq_single",
            Self::McqMultiple => "mcq_multiple",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Citation proving a synthesized question's grounding.
///
/// The excerpt is verbatim chunk text; the concept is the testable claim the
/// extractor derived from it. Never fabricated: drafts whose excerpt cannot be
/// matched back to retrieved text are rejected before crafting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Verbatim supporting excerpt from a document chunk
    pub excerpt: String,

    /// The testable claim derived from the excerpt
    pub concept: String,

    /// Title of the source document, or the ungrounded marker
    pub source_title: String,
}

/// Reviewer output attached to a synthesized question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Quality score (0.0 - 1.0); 0.5 when the review response was unparseable
    pub score: f64,

    /// Reviewer feedback text
    pub feedback: String,
}

/// Neutral score used when a review response cannot be parsed.
pub const NEUTRAL_REVIEW_SCORE: f64 = 0.5;

/// A persisted question, from manual bank entry or the synthesis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier
    pub id: String,

    /// Question text per language
    pub text: LangText,

    /// Question type
    pub question_type: QuestionType,

    /// Options per language (empty for short-answer)
    pub options: Vec<LangText>,

    /// Correct answers, as option content in the default language
    pub correct_answers: Vec<String>,

    /// Explanation per language
    pub explanation: LangText,

    /// Marks awarded for a correct response
    pub marks: f64,

    /// Difficulty rating (1 - 5)
    pub difficulty: u8,

    /// Topic tags
    pub tags: Vec<String>,

    /// Grounding citation (synthesized questions only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,

    /// Reviewer verdict (synthesized questions only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<Review>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_text_falls_back_to_default_then_any() {
        let mut text = LangText::from_default("hello");
        text.set("hi", "namaste");

        assert_eq!(text.resolve("hi"), Some("namaste"));
        assert_eq!(text.resolve("fr"), Some("hello"));

        let mut no_default = LangText::default();
        no_default.set("hi", "namaste");
        assert_eq!(no_default.resolve("fr"), Some("namaste"));
    }

    #[test]
    fn question_type_option_requirements() {
        assert_eq!(QuestionType::McqSingle.required_options(), Some(4));
        assert_eq!(QuestionType::McqMultiple.required_options(), Some(4));
        assert_eq!(QuestionType::TrueFalse.required_options(), Some(2));
        assert_eq!(QuestionType::ShortAnswer.required_options(), None);
    }

    #[test]
    fn question_type_wire_names() {
        let t: QuestionType = serde_json::from_str("\"mcq_single\"").unwrap();
        assert_eq!(t, QuestionType::McqSingle);
        assert_eq!(
            serde_json::to_string(&QuestionType::TrueFalse).unwrap(),
            "\"true_false\""
        );
    }
}
