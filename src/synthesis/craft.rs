//! Question crafter: one concept to one fully-formed question draft.

use crate::client::CompletionClient;
use crate::models::{Citation, ExamForgeError, LangText, Question, QuestionType, Result};
use crate::synthesis::prompts::{craft_prompt, salvage_json, StyleProfile};
use crate::synthesis::Concept;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for crafting one rule's worth of questions.
#[derive(Debug, Clone)]
pub struct CraftSpec {
    pub question_type: QuestionType,
    pub difficulty: u8,
    pub marks: f64,
    pub tags: Vec<String>,
    pub style: StyleProfile,
    pub languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DraftPayload {
    text: LangText,
    #[serde(default)]
    options: Vec<LangText>,
    answers: Vec<String>,
    #[serde(default)]
    explanation: LangText,
    #[serde(default)]
    difficulty: Option<u8>,
}

/// Second pipeline stage: one completion call per concept.
pub struct QuestionCrafter {
    client: Arc<CompletionClient>,
}

impl QuestionCrafter {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Craft one question draft from a concept.
    ///
    /// The draft carries a citation back to the concept and its excerpt;
    /// `source_title` names the document the excerpt was retrieved from.
    /// Completion failure and unparseable or constraint-violating payloads
    /// are fatal for the draft (and therefore for the rule).
    pub async fn craft(
        &self,
        concept: &Concept,
        source_title: &str,
        spec: &CraftSpec,
    ) -> Result<Question> {
        let prompt = craft_prompt(
            &concept.claim,
            &concept.excerpt,
            spec.question_type,
            spec.difficulty,
            spec.style,
            &spec.languages,
        );
        let content = self.client.complete(&prompt, None).await?;

        let payload: DraftPayload = serde_json::from_str(salvage_json(&content))
            .map_err(|e| ExamForgeError::malformed("craft", format!("{e}: {content}")))?;

        Self::validate(&payload, spec.question_type)?;

        let difficulty = payload
            .difficulty
            .filter(|d| (1..=5).contains(d))
            .unwrap_or(spec.difficulty);

        Ok(Question {
            id: Uuid::new_v4().to_string(),
            text: payload.text,
            question_type: spec.question_type,
            options: payload.options,
            correct_answers: payload.answers,
            explanation: payload.explanation,
            marks: spec.marks,
            difficulty,
            tags: spec.tags.clone(),
            citation: Some(Citation {
                excerpt: concept.excerpt.clone(),
                concept: concept.claim.clone(),
                source_title: source_title.to_string(),
            }),
            review: None,
            created_at: Utc::now(),
        })
    }

    fn validate(payload: &DraftPayload, question_type: QuestionType) -> Result<()> {
        if payload.text.is_empty() {
            return Err(ExamForgeError::malformed("craft", "empty question text"));
        }
        if payload.answers.is_empty() {
            return Err(ExamForgeError::malformed("craft", "no answers given"));
        }

        if let Some(required) = question_type.required_options() {
            if payload.options.len() != required {
                return Err(ExamForgeError::malformed(
                    "craft",
                    format!(
                        "{question_type} requires {required} options, got {}",
                        payload.options.len()
                    ),
                ));
            }

            // Answers are option content, never labels.
            for answer in &payload.answers {
                let matches_option = payload
                    .options
                    .iter()
                    .any(|o| o.default_text().eq_ignore_ascii_case(answer.trim()));
                if !matches_option {
                    return Err(ExamForgeError::malformed(
                        "craft",
                        format!("answer '{answer}' does not match any option content"),
                    ));
                }
            }
        }

        if question_type == QuestionType::McqSingle || question_type == QuestionType::TrueFalse {
            if payload.answers.len() != 1 {
                return Err(ExamForgeError::malformed(
                    "craft",
                    format!(
                        "{question_type} takes exactly one answer, got {}",
                        payload.answers.len()
                    ),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CompletionBackend, CredentialPool};
    use crate::models::Result as CrateResult;
    use async_trait::async_trait;
    use std::time::Duration;

    struct CannedBackend(String);

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(
            &self,
            _credential: &str,
            _model: &str,
            _prompt: &str,
        ) -> CrateResult<String> {
            Ok(self.0.clone())
        }

        async fn embed(&self, _credential: &str, _model: &str, _text: &str) -> CrateResult<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    fn crafter(response: &str) -> QuestionCrafter {
        let pool = Arc::new(CredentialPool::new(vec!["k".to_string()]).unwrap());
        let client = Arc::new(CompletionClient::new(
            Arc::new(CannedBackend(response.to_string())),
            pool,
            "m",
            "e",
            Duration::ZERO,
        ));
        QuestionCrafter::new(client)
    }

    fn concept() -> Concept {
        Concept {
            claim: "Force equals mass times acceleration".to_string(),
            excerpt: "F = ma for a constant mass.".to_string(),
        }
    }

    fn spec(question_type: QuestionType) -> CraftSpec {
        CraftSpec {
            question_type,
            difficulty: 3,
            marks: 2.0,
            tags: vec!["mechanics".to_string()],
            style: StyleProfile::DirectRecall,
            languages: vec!["en".to_string()],
        }
    }

    const TRUE_FALSE_DRAFT: &str = r#"{
        "text": {"en": "Doubling the mass doubles the force at fixed acceleration."},
        "options": [{"en": "True"}, {"en": "False"}],
        "answers": ["True"],
        "explanation": {"en": "F = ma is linear in mass."},
        "difficulty": 2
    }"#;

    #[tokio::test]
    async fn crafts_question_with_citation() {
        let question = crafter(TRUE_FALSE_DRAFT)
            .craft(&concept(), "Mechanics", &spec(QuestionType::TrueFalse))
            .await
            .unwrap();

        assert_eq!(question.options.len(), 2);
        assert_eq!(question.correct_answers, vec!["True".to_string()]);
        assert_eq!(question.difficulty, 2);
        assert!((question.marks - 2.0).abs() < f64::EPSILON);

        let citation = question.citation.unwrap();
        assert_eq!(citation.excerpt, "F = ma for a constant mass.");
        assert_eq!(citation.source_title, "Mechanics");
    }

    #[tokio::test]
    async fn wrong_option_count_is_fatal() {
        let err = crafter(TRUE_FALSE_DRAFT)
            .craft(&concept(), "Mechanics", &spec(QuestionType::McqSingle))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamForgeError::MalformedResponse { stage: "craft", .. }
        ));
    }

    #[tokio::test]
    async fn label_answers_are_rejected() {
        let draft = r#"{
            "text": {"en": "Which is a unit of force?"},
            "options": [{"en": "Newton"}, {"en": "Joule"}, {"en": "Watt"}, {"en": "Pascal"}],
            "answers": ["A"],
            "explanation": {"en": "The newton measures force."}
        }"#;

        let err = crafter(draft)
            .craft(&concept(), "Mechanics", &spec(QuestionType::McqSingle))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match any option"));
    }

    #[tokio::test]
    async fn invalid_difficulty_falls_back_to_requested() {
        let draft = r#"{
            "text": {"en": "True or false: F = ma."},
            "options": [{"en": "True"}, {"en": "False"}],
            "answers": ["True"],
            "explanation": {"en": "Definition."},
            "difficulty": 9
        }"#;

        let question = crafter(draft)
            .craft(&concept(), "Mechanics", &spec(QuestionType::TrueFalse))
            .await
            .unwrap();
        assert_eq!(question.difficulty, 3);
    }
}
