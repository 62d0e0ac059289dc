//! Blueprint model: the reusable template an assembly run consumes.

use crate::models::QuestionType;
use serde::{Deserialize, Serialize};

/// How a rule's questions are sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    /// Sample existing questions from the bank
    UseExisting,
    /// Synthesize new questions through the agent pipeline
    GenerateNovel,
}

/// One line-item within a blueprint section.
///
/// Rules are immutable inputs to an assembly run; the same blueprint may be
/// assembled many times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Topic tags questions must match (any overlap)
    pub topic_tags: Vec<String>,

    /// Required question type
    pub question_type: QuestionType,

    /// Number of questions this rule must yield, exactly
    pub count: usize,

    /// Target difficulty (1 - 5)
    pub difficulty: u8,

    /// Marks per question
    pub marks_per_question: f64,

    /// Penalty for a wrong answer
    #[serde(default)]
    pub negative_marks: f64,

    /// Sourcing method
    pub method: GenerationMethod,
}

/// An ordered group of rules within a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintSection {
    /// Section title, carried onto the assembled exam section
    pub title: String,

    /// Rules in declared order
    pub rules: Vec<Rule>,
}

/// A reusable exam template: ordered sections of ordered rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Sections in declared order
    pub sections: Vec<BlueprintSection>,
}

impl Blueprint {
    /// Total number of questions a full assembly of this blueprint yields.
    pub fn total_question_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.rules.iter())
            .map(|r| r.count)
            .sum()
    }

    /// Expected total marks of a full assembly.
    pub fn expected_total_marks(&self) -> f64 {
        self.sections
            .iter()
            .flat_map(|s| s.rules.iter())
            .map(|r| r.count as f64 * r.marks_per_question)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(count: usize, marks: f64) -> Rule {
        Rule {
            topic_tags: vec!["algebra".to_string()],
            question_type: QuestionType::McqSingle,
            count,
            difficulty: 3,
            marks_per_question: marks,
            negative_marks: 0.25,
            method: GenerationMethod::UseExisting,
        }
    }

    #[test]
    fn blueprint_totals() {
        let bp = Blueprint {
            id: "bp1".to_string(),
            name: "Midterm".to_string(),
            sections: vec![
                BlueprintSection {
                    title: "A".to_string(),
                    rules: vec![rule(5, 2.0), rule(3, 1.0)],
                },
                BlueprintSection {
                    title: "B".to_string(),
                    rules: vec![rule(2, 4.0)],
                },
            ],
        };

        assert_eq!(bp.total_question_count(), 10);
        assert!((bp.expected_total_marks() - 21.0).abs() < f64::EPSILON);
    }
}
