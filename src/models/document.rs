//! Reference material: source documents decomposed into embedded chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document whose text grounds question synthesis.
///
/// Immutable once created; deleted only as a whole, cascading to its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDocument {
    /// Unique identifier
    pub id: String,

    /// Document title, surfaced as the citation source
    pub title: String,

    /// Document author
    pub author: String,

    /// Ingestion timestamp
    pub created_at: DateTime<Utc>,
}

/// One chunk of a reference document with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique identifier
    pub id: String,

    /// Owning document
    pub document_id: String,

    /// Position within the document (0-based)
    pub seq: usize,

    /// Raw chunk text
    pub text: String,

    /// Fixed-dimension embedding vector
    pub embedding: Vec<f32>,
}
