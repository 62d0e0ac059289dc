//! Completion client: credential rotation over a one-shot transport.
//!
//! One logical call may fan out into several attempts: rate-limit and
//! transient-unavailability signals advance the pool cursor and retry after a
//! fixed backoff, bounded at twice the pool size. Every other error
//! propagates immediately.

use crate::client::{CompletionBackend, CredentialPool};
use crate::models::{ExamForgeError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the external completion/embedding service.
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    pool: Arc<CredentialPool>,
    completion_model: String,
    embedding_model: String,
    backoff: Duration,
}

impl CompletionClient {
    /// Create a client over a transport and credential pool.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        pool: Arc<CredentialPool>,
        completion_model: impl Into<String>,
        embedding_model: impl Into<String>,
        backoff: Duration,
    ) -> Self {
        Self {
            backend,
            pool,
            completion_model: completion_model.into(),
            embedding_model: embedding_model.into(),
            backoff,
        }
    }

    /// The credential pool in use (shared, process-wide).
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Issue a completion call, rotating credentials on transient failures.
    ///
    /// `model_hint` overrides the configured completion model when set.
    pub async fn complete(&self, prompt: &str, model_hint: Option<&str>) -> Result<String> {
        let model = model_hint.unwrap_or(&self.completion_model).to_string();
        let max_attempts = self.pool.attempt_bound();
        let mut last_error: Option<ExamForgeError> = None;

        for attempt in 0..max_attempts {
            let credential = self.pool.current().to_string();

            match self.backend.complete(&credential, &model, prompt).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() => {
                    self.pool.advance();
                    debug!(
                        attempt = attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %e,
                        "Transient completion failure, rotating credential"
                    );
                    last_error = Some(e);
                    if attempt < max_attempts - 1 {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts = max_attempts, "Credential pool exhausted");
        Err(ExamForgeError::PoolExhausted {
            attempts: max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Issue an embedding call, rotating credentials on transient failures.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let max_attempts = self.pool.attempt_bound();
        let mut last_error: Option<ExamForgeError> = None;

        for attempt in 0..max_attempts {
            let credential = self.pool.current().to_string();

            match self
                .backend
                .embed(&credential, &self.embedding_model, text)
                .await
            {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_transient() => {
                    self.pool.advance();
                    debug!(
                        attempt = attempt,
                        error = %e,
                        "Transient embedding failure, rotating credential"
                    );
                    last_error = Some(e);
                    if attempt < max_attempts - 1 {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts = max_attempts, "Credential pool exhausted");
        Err(ExamForgeError::PoolExhausted {
            attempts: max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
