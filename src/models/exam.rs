//! Assembled exam, section, and link models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an assembled exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    /// Freshly assembled, not yet published
    Draft,
    /// Visible to candidates
    Published,
    /// Withdrawn from use
    Archived,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

/// A persisted, gradeable exam produced by one assembly run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    /// Unique identifier
    pub id: String,

    /// Exam title
    pub title: String,

    /// Description shown to candidates
    pub description: String,

    /// Duration in minutes
    pub duration_mins: u32,

    /// Sum of marks across all section-question links.
    /// Computed once at assembly time, never implicitly recomputed.
    pub total_marks: f64,

    /// Lifecycle status, starts at [`ExamStatus::Draft`]
    pub status: ExamStatus,

    /// ID of the user who requested assembly
    pub created_by: String,

    /// Assembly timestamp
    pub created_at: DateTime<Utc>,
}

/// One section of an assembled exam, in blueprint order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSection {
    /// Unique identifier
    pub id: String,

    /// Owning exam
    pub exam_id: String,

    /// Section title from the blueprint
    pub title: String,

    /// Position within the exam (1-based)
    pub order_index: usize,

    /// Sum of link marks within this section
    pub section_marks: f64,
}

/// Join record linking a question into an exam section.
///
/// The many-to-many join: a question may appear in multiple sections and
/// exams simultaneously; the question row itself is never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionQuestionLink {
    /// Unique identifier
    pub id: String,

    /// Owning section
    pub section_id: String,

    /// Linked question
    pub question_id: String,

    /// Marks for this placement (overrides the question's own marks)
    pub marks: f64,

    /// Negative-marks penalty for this placement
    pub negative_marks: f64,

    /// Position within the section: dense, 1-based, no gaps or duplicates
    pub order_index: usize,
}
