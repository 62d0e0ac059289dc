//! Reviewer: quality scoring of crafted drafts against their citations.

use crate::client::CompletionClient;
use crate::models::{Question, Result, Review, NEUTRAL_REVIEW_SCORE};
use crate::synthesis::prompts::{review_prompt, salvage_json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    difficulty: Option<u8>,
}

/// Third pipeline stage: one completion call per draft.
///
/// Review is a quality signal, not a correctness gate: an unparseable review
/// response keeps the draft with a neutral default score instead of
/// discarding it. Completion failures still propagate.
pub struct Reviewer {
    client: Arc<CompletionClient>,
}

impl Reviewer {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Review a draft in place: attaches the review and may revise the
    /// difficulty rating (the reviewer's value wins over the crafter's).
    pub async fn review(&self, mut question: Question) -> Result<Question> {
        let options: Vec<String> = question
            .options
            .iter()
            .map(|o| o.default_text().to_string())
            .collect();
        let excerpt = question
            .citation
            .as_ref()
            .map(|c| c.excerpt.as_str())
            .unwrap_or("(no citation)");

        let prompt = review_prompt(
            question.text.default_text(),
            &options,
            &question.correct_answers,
            question.explanation.default_text(),
            excerpt,
        );
        let content = self.client.complete(&prompt, None).await?;

        match serde_json::from_str::<ReviewPayload>(salvage_json(&content)) {
            Ok(payload) => {
                if let Some(difficulty) = payload.difficulty.filter(|d| (1..=5).contains(d)) {
                    if difficulty != question.difficulty {
                        debug!(
                            question_id = %question.id,
                            from = question.difficulty,
                            to = difficulty,
                            "Reviewer revised difficulty"
                        );
                        question.difficulty = difficulty;
                    }
                }
                question.review = Some(Review {
                    score: payload.score.clamp(0.0, 1.0),
                    feedback: payload.feedback,
                });
            }
            Err(e) => {
                warn!(
                    question_id = %question.id,
                    error = %e,
                    "Review response unparseable, keeping draft with neutral score"
                );
                question.review = Some(Review {
                    score: NEUTRAL_REVIEW_SCORE,
                    feedback: String::new(),
                });
            }
        }

        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CompletionBackend, CredentialPool};
    use crate::models::{Citation, LangText, QuestionType, Result as CrateResult};
    use async_trait::async_trait;
    use chrono::Utc;
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

    fn reviewer(response: &str) -> Reviewer {
        let pool = Arc::new(CredentialPool::new(vec!["k".to_string()]).unwrap());
        let client = Arc::new(CompletionClient::new(
            Arc::new(CannedBackend(response.to_string())),
            pool,
            "m",
            "e",
            Duration::ZERO,
        ));
        Reviewer::new(client)
    }

    fn draft() -> Question {
        Question {
            id: "q1".to_string(),
            text: LangText::from_default("Is F = ma?"),
            question_type: QuestionType::TrueFalse,
            options: vec![LangText::from_default("True"), LangText::from_default("False")],
            correct_answers: vec!["True".to_string()],
            explanation: LangText::from_default("Definition."),
            marks: 1.0,
            difficulty: 3,
            tags: vec![],
            citation: Some(Citation {
                excerpt: "F = ma".to_string(),
                concept: "Newton's second law".to_string(),
                source_title: "Mechanics".to_string(),
            }),
            review: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn attaches_score_and_revises_difficulty() {
        let response = r#"{"score": 0.92, "feedback": "Sound.", "difficulty": 2}"#;
        let reviewed = reviewer(response).review(draft()).await.unwrap();

        let review = reviewed.review.unwrap();
        assert!((review.score - 0.92).abs() < f64::EPSILON);
        assert_eq!(review.feedback, "Sound.");
        assert_eq!(reviewed.difficulty, 2);
    }

    #[tokio::test]
    async fn null_difficulty_keeps_crafter_rating() {
        let response = r#"{"score": 0.8, "feedback": "ok", "difficulty": null}"#;
        let reviewed = reviewer(response).review(draft()).await.unwrap();
        assert_eq!(reviewed.difficulty, 3);
    }

    #[tokio::test]
    async fn unparseable_review_keeps_draft_with_neutral_score() {
        let reviewed = reviewer("I think it is fine")
            .review(draft())
            .await
            .unwrap();

        let review = reviewed.review.unwrap();
        assert!((review.score - NEUTRAL_REVIEW_SCORE).abs() < f64::EPSILON);
        assert_eq!(reviewed.difficulty, 3);
    }

    #[tokio::test]
    async fn out_of_range_score_is_clamped() {
        let response = r#"{"score": 7.5, "feedback": "great"}"#;
        let reviewed = reviewer(response).review(draft()).await.unwrap();
        assert!((reviewed.review.unwrap().score - 1.0).abs() < f64::EPSILON);
    }
}
