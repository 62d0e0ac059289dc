//! # examforge
//!
//! AI-assisted exam assembly: blueprints describe the shape of an exam
//! (sections, question counts, difficulty, marks), and examforge fills that
//! shape either from an existing question bank or by synthesizing new
//! questions grounded in ingested reference documents.
//!
//! ## Architecture
//!
//! - [`client`] - completion/embedding client with credential pool rotation
//!   and fixed-backoff retry over a pluggable transport
//! - [`store`] - persistence trait plus an in-memory implementation with an
//!   optional JSON snapshot
//! - [`retrieval`] - topic embedding and nearest-chunk grounding with a
//!   diversity offset, plus the document chunker
//! - [`synthesis`] - the three-agent pipeline (concept extraction, question
//!   crafting, review) running in rate-limited batches
//! - [`assembler`] - blueprint resolution into a persisted exam with dense
//!   section and question ordering
//!
//! ## Quick start
//!
//! ```no_run
//! use examforge::assembler::{AssemblyRequest, ExamAssembler};
//! use examforge::client::{CompletionClient, CredentialPool, HttpBackend};
//! use examforge::models::Config;
//! use examforge::retrieval::Retriever;
//! use examforge::store::MemoryStore;
//! use examforge::synthesis::{ConceptExtractor, QuestionCrafter, Reviewer, SynthesisPipeline};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_file(std::path::Path::new("examforge.toml"))?;
//! let keys = config.credentials.resolve_keys()?;
//!
//! let backend = Arc::new(HttpBackend::new(
//!     &config.service.base_url,
//!     config.service.timeout_secs,
//! )?);
//! let pool = Arc::new(CredentialPool::new(keys)?);
//! let client = Arc::new(CompletionClient::new(
//!     backend,
//!     pool,
//!     &config.service.completion_model,
//!     &config.service.embedding_model,
//!     Duration::from_millis(config.credentials.backoff_ms),
//! ));
//!
//! let store: Arc<dyn examforge::store::Storage> = Arc::new(MemoryStore::new());
//! let pipeline = SynthesisPipeline::new(
//!     ConceptExtractor::new(Arc::clone(&client)),
//!     QuestionCrafter::new(Arc::clone(&client)),
//!     Reviewer::new(Arc::clone(&client)),
//!     &config.synthesis,
//! );
//! let assembler = ExamAssembler::new(
//!     Arc::clone(&store),
//!     Retriever::new(client, store),
//!     pipeline,
//!     config.synthesis.languages.clone(),
//! );
//!
//! let exam_id = assembler
//!     .assemble(AssemblyRequest {
//!         blueprint_id: "bp-1".to_string(),
//!         title: "Midterm".to_string(),
//!         description: String::new(),
//!         duration_mins: 90,
//!         created_by: "instructor".to_string(),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod client;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod synthesis;

pub use models::{ExamForgeError, Result};
