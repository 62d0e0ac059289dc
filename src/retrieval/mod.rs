//! Retrieval subsystem: topic phrase to grounding text.
//!
//! Embeds the topic through the completion client and pulls the nearest
//! stored chunk by cosine similarity. A diversity offset lets repeated calls
//! for the same topic within one generation batch surface different, still
//! topically close, chunks instead of hammering the same top hit.

use crate::client::CompletionClient;
use crate::models::Result;
use crate::store::Storage;
use std::sync::Arc;
use tracing::warn;

/// Source-title marker for groundings produced without any document chunks.
pub const UNGROUNDED_SOURCE: &str = "__ungrounded__";

/// Grounding text for one synthesis call.
#[derive(Debug, Clone)]
pub struct Grounding {
    /// The retrieved (or fallback) source text
    pub text: String,

    /// Title of the source document, or [`UNGROUNDED_SOURCE`]
    pub source_title: String,

    /// False only in the no-chunks-found fallback case
    pub grounded: bool,
}

/// Retriever over the chunk store.
pub struct Retriever {
    client: Arc<CompletionClient>,
    store: Arc<dyn Storage>,
}

impl Retriever {
    pub fn new(client: Arc<CompletionClient>, store: Arc<dyn Storage>) -> Self {
        Self { client, store }
    }

    /// Retrieve grounding text for a topic phrase.
    ///
    /// `diversity_offset` skips that many results from the top of the
    /// similarity ranking; when the offset runs past the available chunks the
    /// last (furthest) available chunk is used. With no chunks stored at all
    /// a generic fallback grounding is returned instead of an error, flagged
    /// `grounded = false` and logged as a quality warning.
    pub async fn retrieve_grounding(
        &self,
        topic: &str,
        diversity_offset: usize,
    ) -> Result<Grounding> {
        if self.store.chunk_count().await? == 0 {
            warn!(topic = topic, "No document chunks stored, proceeding ungrounded");
            return Ok(Self::fallback(topic));
        }

        let embedding = self.client.embed(topic).await?;
        let mut hits = self
            .store
            .nearest_chunks(&embedding, diversity_offset + 1, 0)
            .await?;

        // Offset past the end of the ranking: take the furthest hit we have.
        let hit = if hits.len() > diversity_offset {
            hits.swap_remove(diversity_offset)
        } else {
            match hits.pop() {
                Some(hit) => hit,
                None => {
                    warn!(topic = topic, "No comparable chunks found, proceeding ungrounded");
                    return Ok(Self::fallback(topic));
                }
            }
        };

        Ok(Grounding {
            text: hit.chunk.text,
            source_title: hit.source_title,
            grounded: true,
        })
    }

    fn fallback(topic: &str) -> Grounding {
        Grounding {
            text: format!(
                "General academic knowledge about the topic: {topic}. \
                 No source material is available; rely on well-established facts only."
            ),
            source_title: UNGROUNDED_SOURCE.to_string(),
            grounded: false,
        }
    }
}

/// Split document text into chunks for ingestion.
///
/// Paragraph-preserving greedy packing: paragraphs are accumulated until the
/// next one would push a chunk past `max_chars`; a single oversized paragraph
/// becomes its own chunk rather than being split mid-sentence.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CompletionBackend, CompletionClient, CredentialPool};
    use crate::models::{DocumentChunk, ReferenceDocument, Result as CrateResult};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    /// Backend that embeds by keyword lookup; completions are unused here.
    struct KeywordEmbedBackend;

    #[async_trait]
    impl CompletionBackend for KeywordEmbedBackend {
        async fn complete(
            &self,
            _credential: &str,
            _model: &str,
            _prompt: &str,
        ) -> CrateResult<String> {
            Ok(String::new())
        }

        async fn embed(&self, _credential: &str, _model: &str, text: &str) -> CrateResult<Vec<f32>> {
            if text.contains("motion") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_document(ReferenceDocument {
                id: "d1".to_string(),
                title: "Mechanics".to_string(),
                author: "Author".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_chunk(DocumentChunk {
                id: "c1".to_string(),
                document_id: "d1".to_string(),
                seq: 0,
                text: "Bodies in motion remain in motion.".to_string(),
                embedding: vec![1.0, 0.0],
            })
            .await
            .unwrap();
        store
            .insert_chunk(DocumentChunk {
                id: "c2".to_string(),
                document_id: "d1".to_string(),
                seq: 1,
                text: "Energy is conserved in closed systems.".to_string(),
                embedding: vec![0.6, 0.8],
            })
            .await
            .unwrap();
        store
    }

    fn retriever(store: Arc<MemoryStore>) -> Retriever {
        let pool = Arc::new(CredentialPool::new(vec!["k".to_string()]).unwrap());
        let client = Arc::new(CompletionClient::new(
            Arc::new(KeywordEmbedBackend),
            pool,
            "m",
            "e",
            Duration::ZERO,
        ));
        Retriever::new(client, store)
    }

    #[tokio::test]
    async fn offset_zero_is_idempotent() {
        let retriever = retriever(seeded_store().await);

        let first = retriever.retrieve_grounding("laws of motion", 0).await.unwrap();
        let second = retriever.retrieve_grounding("laws of motion", 0).await.unwrap();

        assert!(first.grounded);
        assert_eq!(first.text, second.text);
        assert_eq!(first.source_title, "Mechanics");
    }

    #[tokio::test]
    async fn diversity_offset_surfaces_a_different_chunk() {
        let retriever = retriever(seeded_store().await);

        let top = retriever.retrieve_grounding("laws of motion", 0).await.unwrap();
        let next = retriever.retrieve_grounding("laws of motion", 1).await.unwrap();

        assert_ne!(top.text, next.text);
        assert!(next.grounded);
    }

    #[tokio::test]
    async fn offset_past_available_chunks_still_grounds() {
        let retriever = retriever(seeded_store().await);

        let grounding = retriever.retrieve_grounding("laws of motion", 10).await.unwrap();
        assert!(grounded_text_is_from_store(&grounding.text));
        assert!(grounding.grounded);
    }

    fn grounded_text_is_from_store(text: &str) -> bool {
        text.contains("motion") || text.contains("Energy")
    }

    #[tokio::test]
    async fn empty_store_falls_back_ungrounded() {
        let retriever = retriever(Arc::new(MemoryStore::new()));

        let grounding = retriever.retrieve_grounding("laws of motion", 0).await.unwrap();
        assert!(!grounding.grounded);
        assert_eq!(grounding.source_title, UNGROUNDED_SOURCE);
        assert!(grounding.text.contains("laws of motion"));
    }

    #[test]
    fn chunking_packs_paragraphs() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = chunk_text(text, 45);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("First paragraph"));
        assert!(chunks[1].contains("Third one"));
    }

    #[test]
    fn oversized_paragraph_becomes_own_chunk() {
        let big = "x".repeat(500);
        let text = format!("small one\n\n{big}\n\nanother small");
        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].len(), 500);
    }
}
