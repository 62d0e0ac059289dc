//! Narrow storage interface for the assembly core.
//!
//! The relational store is an external collaborator; this trait is the whole
//! surface the core touches. One implementation ships: [`MemoryStore`], a
//! `DashMap`-backed store with optional JSON-snapshot persistence.

mod memory;

pub use memory::*;

use crate::models::{
    Blueprint, DocumentChunk, Exam, ExamSection, Question, QuestionType, ReferenceDocument, Result,
    SectionQuestionLink,
};
use async_trait::async_trait;

/// Filter for sampling existing bank questions.
#[derive(Debug, Clone)]
pub struct BankFilter {
    /// Required question type
    pub question_type: QuestionType,
    /// Tags to match (any overlap qualifies)
    pub tags: Vec<String>,
    /// Required difficulty
    pub difficulty: u8,
}

/// A nearest-neighbor hit from the chunk store.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    /// The matched chunk
    pub chunk: DocumentChunk,
    /// Title of the chunk's source document
    pub source_title: String,
    /// Cosine similarity against the query vector
    pub score: f64,
}

/// Storage operations the assembly core depends on.
///
/// Blueprint rows are read-only from the core's perspective; the write
/// methods exist for the ingestion/registration paths outside assembly.
#[async_trait]
pub trait Storage: Send + Sync {
    // Reference material

    async fn insert_document(&self, doc: ReferenceDocument) -> Result<()>;

    async fn insert_chunk(&self, chunk: DocumentChunk) -> Result<()>;

    /// Delete a document and, cascading, all of its chunks.
    async fn delete_document(&self, document_id: &str) -> Result<()>;

    async fn chunk_count(&self) -> Result<usize>;

    /// Nearest chunks by cosine similarity, deterministically ranked
    /// (score descending, chunk id ascending on ties), skipping `offset`
    /// results from the top.
    async fn nearest_chunks(
        &self,
        embedding: &[f32],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChunkHit>>;

    // Blueprints

    async fn insert_blueprint(&self, blueprint: Blueprint) -> Result<()>;

    async fn blueprint(&self, id: &str) -> Result<Option<Blueprint>>;

    // Questions

    async fn insert_question(&self, question: Question) -> Result<()>;

    async fn question(&self, id: &str) -> Result<Option<Question>>;

    /// Matching bank questions in deterministic (id) order.
    async fn find_bank_questions(&self, filter: &BankFilter) -> Result<Vec<Question>>;

    // Exams

    async fn insert_exam(&self, exam: Exam) -> Result<()>;

    async fn insert_section(&self, section: ExamSection) -> Result<()>;

    async fn insert_link(&self, link: SectionQuestionLink) -> Result<()>;

    async fn exam(&self, id: &str) -> Result<Option<Exam>>;

    async fn exam_count(&self) -> Result<usize>;

    /// Sections of an exam in order-index order.
    async fn exam_sections(&self, exam_id: &str) -> Result<Vec<ExamSection>>;

    /// Links of a section in order-index order.
    async fn section_links(&self, section_id: &str) -> Result<Vec<SectionQuestionLink>>;
}
