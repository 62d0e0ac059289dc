//! Concept extractor: reference text to citable testable concepts.

use crate::client::CompletionClient;
use crate::models::{ExamForgeError, Result};
use crate::synthesis::prompts::{extract_prompt, salvage_json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// A testable claim with its verbatim supporting excerpt.
///
/// Pipeline-internal and ephemeral: a concept is never persisted on its own,
/// it becomes the citation of the question it produces.
#[derive(Debug, Clone, Deserialize)]
pub struct Concept {
    /// Short testable statement
    pub claim: String,

    /// Verbatim supporting excerpt from the grounding text
    pub excerpt: String,
}

/// First pipeline stage: one completion call yielding the concept list for a
/// whole batch.
pub struct ConceptExtractor {
    client: Arc<CompletionClient>,
}

impl ConceptExtractor {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Extract up to `count` concepts from the combined grounding blob.
    ///
    /// Fatal on completion failure or an unparseable concept list; the
    /// returned list is `min(count, returned)` long.
    pub async fn extract(&self, blob: &str, count: usize) -> Result<Vec<Concept>> {
        let prompt = extract_prompt(blob, count);
        let content = self.client.complete(&prompt, None).await?;

        let mut concepts: Vec<Concept> = serde_json::from_str(salvage_json(&content))
            .map_err(|e| ExamForgeError::malformed("extract", format!("{e}: {content}")))?;

        concepts.retain(|c| !c.claim.trim().is_empty() && !c.excerpt.trim().is_empty());
        concepts.truncate(count);

        debug!(requested = count, extracted = concepts.len(), "Concepts extracted");
        Ok(concepts)
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

    fn extractor(response: &str) -> ConceptExtractor {
        let pool = Arc::new(CredentialPool::new(vec!["k".to_string()]).unwrap());
        let client = Arc::new(CompletionClient::new(
            Arc::new(CannedBackend(response.to_string())),
            pool,
            "m",
            "e",
            Duration::ZERO,
        ));
        ConceptExtractor::new(client)
    }

    #[tokio::test]
    async fn parses_and_truncates_concept_list() {
        let response = r#"```json
        [
            {"claim": "A", "excerpt": "ex A"},
            {"claim": "B", "excerpt": "ex B"},
            {"claim": "C", "excerpt": "ex C"}
        ]
        ```"#;

        let concepts = extractor(response).extract("blob", 2).await.unwrap();
        assert_eq!(concepts.len(), 2);
        assert_eq!(concepts[0].claim, "A");
        assert_eq!(concepts[1].excerpt, "ex B");
    }

    #[tokio::test]
    async fn unparseable_list_is_fatal() {
        let err = extractor("sorry, I cannot do that")
            .extract("blob", 2)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamForgeError::MalformedResponse { stage: "extract", .. }
        ));
    }

    #[tokio::test]
    async fn blank_concepts_are_dropped() {
        let response = r#"[
            {"claim": "A", "excerpt": "ex A"},
            {"claim": "  ", "excerpt": "ex B"}
        ]"#;

        let concepts = extractor(response).extract("blob", 5).await.unwrap();
        assert_eq!(concepts.len(), 1);
    }
}
