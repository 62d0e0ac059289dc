//! Three-stage synthesis pipeline: extract, craft, review.

use crate::models::{ExamForgeError, Question, Result, SynthesisConfig};
use crate::retrieval::{Grounding, UNGROUNDED_SOURCE};
use crate::synthesis::prompts::combine_groundings;
use crate::synthesis::{Concept, ConceptExtractor, CraftSpec, QuestionCrafter, Reviewer};
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info};

/// The synthesis pipeline for one rule's batch of questions.
///
/// Stages run sequentially; within the craft and review stages calls execute
/// in bounded-concurrency batches with a fixed pause between them, the
/// system's deliberate throttle against the completion service's rate
/// ceilings. Results rejoin the original concept order regardless of
/// completion order.
pub struct SynthesisPipeline {
    extractor: ConceptExtractor,
    crafter: QuestionCrafter,
    reviewer: Reviewer,
    batch_size: usize,
    batch_pause: Duration,
}

impl SynthesisPipeline {
    pub fn new(
        extractor: ConceptExtractor,
        crafter: QuestionCrafter,
        reviewer: Reviewer,
        config: &SynthesisConfig,
    ) -> Self {
        Self {
            extractor,
            crafter,
            reviewer,
            batch_size: config.batch_size.max(1),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
        }
    }

    /// Synthesize exactly `count` questions grounded in the given texts.
    ///
    /// Fails with [`ExamForgeError::ShortSynthesis`] if fewer than `count`
    /// usable drafts survive; never returns a partial batch.
    pub async fn synthesize(
        &self,
        spec: &CraftSpec,
        count: usize,
        groundings: &[Grounding],
    ) -> Result<Vec<Question>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let blob = combine_groundings(groundings);
        let concepts = self.extractor.extract(&blob, count).await?;
        let sourced = Self::attach_sources(concepts, groundings);

        if sourced.len() < count {
            return Err(ExamForgeError::ShortSynthesis {
                needed: count,
                produced: sourced.len(),
            });
        }

        info!(
            count = count,
            batch_size = self.batch_size,
            "Crafting questions from extracted concepts"
        );

        let mut drafts = Vec::with_capacity(count);
        for (batch_index, batch) in sourced.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            let results = join_all(
                batch
                    .iter()
                    .map(|(concept, title)| self.crafter.craft(concept, title, spec)),
            )
            .await;
            for result in results {
                drafts.push(result?);
            }
        }

        debug!(drafts = drafts.len(), "Reviewing crafted drafts");

        let mut reviewed = Vec::with_capacity(drafts.len());
        let mut pending = drafts.into_iter().peekable();
        let mut first_batch = true;
        while pending.peek().is_some() {
            if !first_batch {
                tokio::time::sleep(self.batch_pause).await;
            }
            first_batch = false;

            let batch: Vec<Question> = pending.by_ref().take(self.batch_size).collect();
            let results = join_all(batch.into_iter().map(|q| self.reviewer.review(q))).await;
            for result in results {
                reviewed.push(result?);
            }
        }

        if reviewed.len() != count {
            return Err(ExamForgeError::ShortSynthesis {
                needed: count,
                produced: reviewed.len(),
            });
        }

        Ok(reviewed)
    }

    /// Pair each concept with the source document its excerpt came from.
    ///
    /// A concept whose excerpt cannot be matched back to any grounding text
    /// would carry a fabricated citation; it is dropped unless the batch ran
    /// on the ungrounded fallback, in which case the ungrounded marker is
    /// recorded instead.
    fn attach_sources(
        concepts: Vec<Concept>,
        groundings: &[Grounding],
    ) -> Vec<(Concept, String)> {
        let has_ungrounded = groundings.iter().any(|g| !g.grounded);

        concepts
            .into_iter()
            .filter_map(|concept| {
                let matched = groundings
                    .iter()
                    .find(|g| g.grounded && g.text.contains(concept.excerpt.trim()));

                match matched {
                    Some(g) => Some((concept, g.source_title.clone())),
                    None if has_ungrounded => Some((concept, UNGROUNDED_SOURCE.to_string())),
                    None => {
                        debug!(
                            claim = %concept.claim,
                            "Dropping concept with unverifiable excerpt"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CompletionBackend, CompletionClient, CredentialPool};
    use crate::models::{QuestionType, Result as CrateResult};
    use crate::synthesis::prompts::StyleProfile;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Routes prompts to stage-appropriate canned responses.
    struct StageBackend {
        concepts: String,
    }

    #[async_trait]
    impl CompletionBackend for StageBackend {
        async fn complete(
            &self,
            _credential: &str,
            _model: &str,
            prompt: &str,
        ) -> CrateResult<String> {
            if prompt.contains("exam content analyst") {
                return Ok(self.concepts.clone());
            }
            if prompt.contains("exam question writer") {
                // Echo the claim into the question text so order is traceable.
                let claim = prompt
                    .lines()
                    .find_map(|l| l.strip_prefix("Concept: "))
                    .unwrap_or("unknown")
                    .to_string();
                return Ok(format!(
                    r#"{{"text": {{"en": "Q about {claim}"}},
                        "options": [{{"en": "True"}}, {{"en": "False"}}],
                        "answers": ["True"],
                        "explanation": {{"en": "because"}}}}"#
                ));
            }
            Ok(r#"{"score": 0.9, "feedback": "fine", "difficulty": 4}"#.to_string())
        }

        async fn embed(&self, _credential: &str, _model: &str, _text: &str) -> CrateResult<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    fn pipeline(concepts: &str) -> SynthesisPipeline {
        let pool = Arc::new(CredentialPool::new(vec!["k".to_string()]).unwrap());
        let client = Arc::new(CompletionClient::new(
            Arc::new(StageBackend {
                concepts: concepts.to_string(),
            }),
            pool,
            "m",
            "e",
            Duration::ZERO,
        ));
        let config = SynthesisConfig {
            batch_size: 2,
            batch_pause_ms: 0,
            languages: vec!["en".to_string()],
        };
        SynthesisPipeline::new(
            ConceptExtractor::new(Arc::clone(&client)),
            QuestionCrafter::new(Arc::clone(&client)),
            Reviewer::new(client),
            &config,
        )
    }

    fn spec() -> CraftSpec {
        CraftSpec {
            question_type: QuestionType::TrueFalse,
            difficulty: 3,
            marks: 1.0,
            tags: vec!["physics".to_string()],
            style: StyleProfile::MultiStatementTruth,
            languages: vec!["en".to_string()],
        }
    }

    fn grounding(text: &str, title: &str) -> Grounding {
        Grounding {
            text: text.to_string(),
            source_title: title.to_string(),
            grounded: true,
        }
    }

    #[tokio::test]
    async fn produces_exact_count_in_concept_order() {
        let concepts = r#"[
            {"claim": "first", "excerpt": "alpha fact"},
            {"claim": "second", "excerpt": "beta fact"},
            {"claim": "third", "excerpt": "gamma fact"}
        ]"#;
        let groundings = vec![
            grounding("alpha fact and beta fact", "Doc A"),
            grounding("gamma fact", "Doc B"),
        ];

        let questions = pipeline(concepts)
            .synthesize(&spec(), 3, &groundings)
            .await
            .unwrap();

        assert_eq!(questions.len(), 3);
        // Order preserved across concurrent sub-batches.
        assert!(questions[0].text.default_text().contains("first"));
        assert!(questions[1].text.default_text().contains("second"));
        assert!(questions[2].text.default_text().contains("third"));
        // Reviewer difficulty wins.
        assert!(questions.iter().all(|q| q.difficulty == 4));
        // Citations trace to the right sources.
        assert_eq!(
            questions[0].citation.as_ref().unwrap().source_title,
            "Doc A"
        );
        assert_eq!(
            questions[2].citation.as_ref().unwrap().source_title,
            "Doc B"
        );
    }

    #[tokio::test]
    async fn fabricated_excerpt_causes_short_synthesis() {
        let concepts = r#"[
            {"claim": "real", "excerpt": "alpha fact"},
            {"claim": "invented", "excerpt": "this text appears nowhere"}
        ]"#;
        let groundings = vec![grounding("alpha fact", "Doc A")];

        let err = pipeline(concepts)
            .synthesize(&spec(), 2, &groundings)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamForgeError::ShortSynthesis {
                needed: 2,
                produced: 1
            }
        ));
    }

    #[tokio::test]
    async fn under_extraction_fails_whole_rule() {
        let concepts = r#"[{"claim": "only one", "excerpt": "alpha fact"}]"#;
        let groundings = vec![grounding("alpha fact", "Doc A")];

        let err = pipeline(concepts)
            .synthesize(&spec(), 3, &groundings)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamForgeError::ShortSynthesis { .. }));
    }

    #[tokio::test]
    async fn ungrounded_batch_marks_citations() {
        let concepts = r#"[{"claim": "generic", "excerpt": "well-known fact"}]"#;
        let groundings = vec![Grounding {
            text: "General academic knowledge".to_string(),
            source_title: UNGROUNDED_SOURCE.to_string(),
            grounded: false,
        }];

        let questions = pipeline(concepts)
            .synthesize(&spec(), 1, &groundings)
            .await
            .unwrap();
        assert_eq!(
            questions[0].citation.as_ref().unwrap().source_title,
            UNGROUNDED_SOURCE
        );
    }
}
