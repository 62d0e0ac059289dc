//! Error types for examforge.
//!
//! Taxonomy follows the assembly failure semantics: credential exhaustion and
//! malformed agent output are fatal for the enclosing rule; review-stage parse
//! failures are handled inline and never reach this enum; bank shortfalls name
//! the exact rule and counts so callers can act without retrying blindly.

use thiserror::Error;

/// Top-level error type for examforge.
#[derive(Debug, Error)]
pub enum ExamForgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Credential pool is empty")]
    EmptyCredentialPool,

    #[error("Credential pool exhausted after {attempts} attempts: {last_error}")]
    PoolExhausted { attempts: usize, last_error: String },

    #[error("Completion service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Malformed {stage} response: {detail}")]
    MalformedResponse { stage: &'static str, detail: String },

    #[error(
        "Rule {rule_index} in section '{section}' needs {needed} bank questions, found {found}"
    )]
    InsufficientBank {
        section: String,
        rule_index: usize,
        needed: usize,
        found: usize,
    },

    #[error("Synthesis produced {produced} of {needed} requested questions")]
    ShortSynthesis { needed: usize, produced: usize },

    #[error("Rule {rule_index} in section '{section}' failed: {source}")]
    RuleFailed {
        section: String,
        rule_index: usize,
        #[source]
        source: Box<ExamForgeError>,
    },

    #[error("Blueprint not found: {0}")]
    BlueprintNotFound(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExamForgeError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a malformed-response error for a pipeline stage.
    pub fn malformed(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            stage,
            detail: detail.into(),
        }
    }

    /// Whether this error is a rate-limit or transient-unavailability signal.
    ///
    /// Only these errors cause the completion client to rotate credentials
    /// and retry; everything else propagates immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            Self::Timeout(_) => true,
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for examforge.
pub type Result<T> = std::result::Result<T, ExamForgeError>;
