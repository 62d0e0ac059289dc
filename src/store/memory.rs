//! In-memory store with optional JSON-snapshot persistence.
//!
//! Tables are `DashMap`s keyed by entity id. When opened with a data
//! directory, every mutation rewrites `store.json` so CLI runs survive
//! process restarts; opened without one, the store is purely in-memory
//! (the configuration the test suites use).

use crate::models::{
    Blueprint, DocumentChunk, Exam, ExamForgeError, ExamSection, Question, ReferenceDocument,
    Result, SectionQuestionLink,
};
use crate::store::{BankFilter, ChunkHit, Storage};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cosine similarity in f64 precision; `None` on dimension mismatch or a
/// zero-magnitude vector.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

/// Serialized snapshot of every table.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<ReferenceDocument>,
    chunks: Vec<DocumentChunk>,
    blueprints: Vec<Blueprint>,
    questions: Vec<Question>,
    exams: Vec<Exam>,
    sections: Vec<ExamSection>,
    links: Vec<SectionQuestionLink>,
}

/// DashMap-backed store, the single source of truth for persisted entities.
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<String, ReferenceDocument>,
    chunks: DashMap<String, DocumentChunk>,
    blueprints: DashMap<String, Blueprint>,
    questions: DashMap<String, Question>,
    exams: DashMap<String, Exam>,
    sections: DashMap<String, ExamSection>,
    links: DashMap<String, SectionQuestionLink>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot in `data_dir`, loading any existing
    /// snapshot.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ExamForgeError::io("creating data directory", e))?;

        let snapshot_path = data_dir.join("store.json");
        let store = Self {
            snapshot_path: Some(snapshot_path.clone()),
            ..Self::default()
        };

        if snapshot_path.exists() {
            let content = std::fs::read_to_string(&snapshot_path)
                .map_err(|e| ExamForgeError::io("reading store snapshot", e))?;
            let snapshot: Snapshot = serde_json::from_str(&content)
                .map_err(|e| ExamForgeError::Internal(format!("Corrupt store snapshot: {e}")))?;
            store.load_snapshot(snapshot);
        }

        Ok(store)
    }

    fn load_snapshot(&self, snapshot: Snapshot) {
        for doc in snapshot.documents {
            self.documents.insert(doc.id.clone(), doc);
        }
        for chunk in snapshot.chunks {
            self.chunks.insert(chunk.id.clone(), chunk);
        }
        for bp in snapshot.blueprints {
            self.blueprints.insert(bp.id.clone(), bp);
        }
        for q in snapshot.questions {
            self.questions.insert(q.id.clone(), q);
        }
        for exam in snapshot.exams {
            self.exams.insert(exam.id.clone(), exam);
        }
        for section in snapshot.sections {
            self.sections.insert(section.id.clone(), section);
        }
        for link in snapshot.links {
            self.links.insert(link.id.clone(), link);
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            documents: self.documents.iter().map(|e| e.value().clone()).collect(),
            chunks: self.chunks.iter().map(|e| e.value().clone()).collect(),
            blueprints: self.blueprints.iter().map(|e| e.value().clone()).collect(),
            questions: self.questions.iter().map(|e| e.value().clone()).collect(),
            exams: self.exams.iter().map(|e| e.value().clone()).collect(),
            sections: self.sections.iter().map(|e| e.value().clone()).collect(),
            links: self.links.iter().map(|e| e.value().clone()).collect(),
        };

        let content = serde_json::to_string(&snapshot)
            .map_err(|e| ExamForgeError::Internal(format!("Serializing store snapshot: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| ExamForgeError::io("writing store snapshot", e))?;
        Ok(())
    }

    /// Number of stored questions (bank plus synthesized).
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn insert_document(&self, doc: ReferenceDocument) -> Result<()> {
        self.documents.insert(doc.id.clone(), doc);
        self.persist()
    }

    async fn insert_chunk(&self, chunk: DocumentChunk) -> Result<()> {
        self.chunks.insert(chunk.id.clone(), chunk);
        self.persist()
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.documents.remove(document_id);
        self.chunks.retain(|_, c| c.document_id != document_id);
        self.persist()
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.chunks.len())
    }

    async fn nearest_chunks(
        &self,
        embedding: &[f32],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChunkHit>> {
        let mut hits: Vec<ChunkHit> = self
            .chunks
            .iter()
            .filter_map(|entry| {
                let chunk = entry.value();
                let score = cosine_similarity(embedding, &chunk.embedding)?;
                let source_title = self
                    .documents
                    .get(&chunk.document_id)
                    .map(|d| d.title.clone())
                    .unwrap_or_default();
                Some(ChunkHit {
                    chunk: chunk.clone(),
                    source_title,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });

        Ok(hits.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_blueprint(&self, blueprint: Blueprint) -> Result<()> {
        self.blueprints.insert(blueprint.id.clone(), blueprint);
        self.persist()
    }

    async fn blueprint(&self, id: &str) -> Result<Option<Blueprint>> {
        Ok(self.blueprints.get(id).map(|e| e.value().clone()))
    }

    async fn insert_question(&self, question: Question) -> Result<()> {
        self.questions.insert(question.id.clone(), question);
        self.persist()
    }

    async fn question(&self, id: &str) -> Result<Option<Question>> {
        Ok(self.questions.get(id).map(|e| e.value().clone()))
    }

    async fn find_bank_questions(&self, filter: &BankFilter) -> Result<Vec<Question>> {
        let mut matches: Vec<Question> = self
            .questions
            .iter()
            .filter(|entry| {
                let q = entry.value();
                q.question_type == filter.question_type
                    && q.difficulty == filter.difficulty
                    && (filter.tags.is_empty()
                        || q.tags.iter().any(|t| filter.tags.contains(t)))
            })
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    async fn insert_exam(&self, exam: Exam) -> Result<()> {
        self.exams.insert(exam.id.clone(), exam);
        self.persist()
    }

    async fn insert_section(&self, section: ExamSection) -> Result<()> {
        self.sections.insert(section.id.clone(), section);
        self.persist()
    }

    async fn insert_link(&self, link: SectionQuestionLink) -> Result<()> {
        self.links.insert(link.id.clone(), link);
        self.persist()
    }

    async fn exam(&self, id: &str) -> Result<Option<Exam>> {
        Ok(self.exams.get(id).map(|e| e.value().clone()))
    }

    async fn exam_count(&self) -> Result<usize> {
        Ok(self.exams.len())
    }

    async fn exam_sections(&self, exam_id: &str) -> Result<Vec<ExamSection>> {
        let mut sections: Vec<ExamSection> = self
            .sections
            .iter()
            .filter(|e| e.value().exam_id == exam_id)
            .map(|e| e.value().clone())
            .collect();
        sections.sort_by_key(|s| s.order_index);
        Ok(sections)
    }

    async fn section_links(&self, section_id: &str) -> Result<Vec<SectionQuestionLink>> {
        let mut links: Vec<SectionQuestionLink> = self
            .links
            .iter()
            .filter(|e| e.value().section_id == section_id)
            .map(|e| e.value().clone())
            .collect();
        links.sort_by_key(|l| l.order_index);
        Ok(links)
    }
}
