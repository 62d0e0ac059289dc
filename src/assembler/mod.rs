//! Exam assembler: blueprint to persisted, gradeable exam.

use crate::models::{
    BlueprintSection, Exam, ExamForgeError, ExamSection, ExamStatus, GenerationMethod, Question,
    Result, Rule, SectionQuestionLink,
};
use crate::retrieval::Retriever;
use crate::store::{BankFilter, Storage};
use crate::synthesis::{CraftSpec, StyleProfile, SynthesisPipeline};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Caller-facing request for one assembly run.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub blueprint_id: String,
    pub title: String,
    pub description: String,
    pub duration_mins: u32,
    pub created_by: String,
}

/// One question collected for a section, with its placement marks.
struct CollectedQuestion {
    question_id: String,
    marks: f64,
    negative_marks: f64,
}

struct CollectedSection {
    title: String,
    questions: Vec<CollectedQuestion>,
}

/// Assembles exams from blueprints.
///
/// Questions synthesized for `generate_novel` rules are persisted eagerly,
/// as soon as each one exists; the exam, section, and link rows are created
/// only after every rule across every section has been satisfied. A failure
/// partway through a run therefore leaves no partial exam, but can leave
/// orphaned question rows behind, subject to separate cleanup.
pub struct ExamAssembler {
    store: Arc<dyn Storage>,
    retriever: Retriever,
    pipeline: SynthesisPipeline,
    languages: Vec<String>,
}

impl ExamAssembler {
    pub fn new(
        store: Arc<dyn Storage>,
        retriever: Retriever,
        pipeline: SynthesisPipeline,
        languages: Vec<String>,
    ) -> Self {
        Self {
            store,
            retriever,
            pipeline,
            languages,
        }
    }

    /// Assemble an exam from a blueprint. Returns the new exam id.
    ///
    /// Fails with a structured error naming the first rule that could not be
    /// satisfied; rules resolve strictly in declared order.
    pub async fn assemble(&self, request: AssemblyRequest) -> Result<String> {
        let blueprint = self
            .store
            .blueprint(&request.blueprint_id)
            .await?
            .ok_or_else(|| ExamForgeError::BlueprintNotFound(request.blueprint_id.clone()))?;

        info!(
            blueprint = %blueprint.id,
            sections = blueprint.sections.len(),
            "Starting assembly run"
        );

        let mut collected: Vec<CollectedSection> = Vec::with_capacity(blueprint.sections.len());
        let mut total_marks = 0.0f64;

        for section in &blueprint.sections {
            let questions = self.resolve_section(section).await?;
            total_marks += questions.iter().map(|q| q.marks).sum::<f64>();
            collected.push(CollectedSection {
                title: section.title.clone(),
                questions,
            });
        }

        // All rules satisfied; persist the exam skeleton in blueprint order.
        let exam_id = Uuid::new_v4().to_string();
        self.store
            .insert_exam(Exam {
                id: exam_id.clone(),
                title: request.title,
                description: request.description,
                duration_mins: request.duration_mins,
                total_marks,
                status: ExamStatus::Draft,
                created_by: request.created_by,
                created_at: Utc::now(),
            })
            .await?;

        for (section_index, section) in collected.into_iter().enumerate() {
            let section_id = Uuid::new_v4().to_string();
            let section_marks = section.questions.iter().map(|q| q.marks).sum::<f64>();

            self.store
                .insert_section(ExamSection {
                    id: section_id.clone(),
                    exam_id: exam_id.clone(),
                    title: section.title,
                    order_index: section_index + 1,
                    section_marks,
                })
                .await?;

            for (question_index, question) in section.questions.into_iter().enumerate() {
                self.store
                    .insert_link(SectionQuestionLink {
                        id: Uuid::new_v4().to_string(),
                        section_id: section_id.clone(),
                        question_id: question.question_id,
                        marks: question.marks,
                        negative_marks: question.negative_marks,
                        order_index: question_index + 1,
                    })
                    .await?;
            }
        }

        info!(exam_id = %exam_id, total_marks = total_marks, "Assembly run complete");
        Ok(exam_id)
    }

    async fn resolve_section(&self, section: &BlueprintSection) -> Result<Vec<CollectedQuestion>> {
        let mut questions = Vec::new();

        for (rule_index, rule) in section.rules.iter().enumerate() {
            let resolved = match rule.method {
                GenerationMethod::UseExisting => {
                    self.sample_existing(&section.title, rule_index, rule).await?
                }
                GenerationMethod::GenerateNovel => self
                    .synthesize_novel(rule)
                    .await
                    .map_err(|e| match e {
                        // Bank shortfalls already carry rule identity.
                        err @ ExamForgeError::InsufficientBank { .. } => err,
                        err => ExamForgeError::RuleFailed {
                            section: section.title.clone(),
                            rule_index,
                            source: Box::new(err),
                        },
                    })?,
            };

            questions.extend(resolved.into_iter().map(|q| CollectedQuestion {
                question_id: q.id,
                marks: rule.marks_per_question,
                negative_marks: rule.negative_marks,
            }));
        }

        Ok(questions)
    }

    /// Sample exactly `rule.count` matching bank questions, deterministically.
    async fn sample_existing(
        &self,
        section_title: &str,
        rule_index: usize,
        rule: &Rule,
    ) -> Result<Vec<Question>> {
        let filter = BankFilter {
            question_type: rule.question_type,
            tags: rule.topic_tags.clone(),
            difficulty: rule.difficulty,
        };
        let mut matches = self.store.find_bank_questions(&filter).await?;

        if matches.len() < rule.count {
            return Err(ExamForgeError::InsufficientBank {
                section: section_title.to_string(),
                rule_index,
                needed: rule.count,
                found: matches.len(),
            });
        }

        matches.truncate(rule.count);
        Ok(matches)
    }

    /// Synthesize `rule.count` new questions, persisting each immediately.
    async fn synthesize_novel(&self, rule: &Rule) -> Result<Vec<Question>> {
        let topic = rule.topic_tags.join(", ");

        // One retrieval per requested question, varying the diversity offset
        // so the batch draws on different nearby chunks.
        let mut groundings = Vec::with_capacity(rule.count);
        for offset in 0..rule.count {
            groundings.push(self.retriever.retrieve_grounding(&topic, offset).await?);
        }

        if groundings.iter().any(|g| !g.grounded) {
            warn!(topic = %topic, "Synthesizing with ungrounded fallback text");
        }

        let spec = CraftSpec {
            question_type: rule.question_type,
            difficulty: rule.difficulty,
            marks: rule.marks_per_question,
            tags: rule.topic_tags.clone(),
            style: StyleProfile::default_for(rule.question_type),
            languages: self.languages.clone(),
        };

        let questions = self.pipeline.synthesize(&spec, rule.count, &groundings).await?;

        // Eager persistence: each question is committed as soon as it exists,
        // not deferred to the end of the run.
        for question in &questions {
            self.store.insert_question(question.clone()).await?;
        }

        Ok(questions)
    }
}
