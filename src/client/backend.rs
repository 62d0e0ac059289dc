//! Transport for the external completion/embedding service.
//!
//! The [`CompletionBackend`] trait is the seam between the rotation logic in
//! [`crate::client::CompletionClient`] and the wire. The shipped backend talks
//! to any OpenAI-compatible endpoint; tests substitute scripted backends.

use crate::models::{ExamForgeError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One-shot transport operations against the completion service.
///
/// Implementations perform a single attempt per call; retry and credential
/// rotation live in the client above this trait.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Issue one completion call with the given credential.
    async fn complete(&self, credential: &str, model: &str, prompt: &str) -> Result<String>;

    /// Issue one embedding call with the given credential.
    async fn embed(&self, credential: &str, model: &str, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// HTTP backend for OpenAI-compatible endpoints.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend against the given base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ExamForgeError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn headers(credential: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {credential}")) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn classify_send_error(&self, e: reqwest::Error) -> ExamForgeError {
        if e.is_timeout() {
            ExamForgeError::Timeout(self.timeout)
        } else {
            ExamForgeError::Network(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        Err(ExamForgeError::Api { status, message })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, credential: &str, model: &str, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(Self::headers(credential))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let response = Self::check_status(response).await?;
        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ExamForgeError::malformed("completion", e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExamForgeError::malformed("completion", "no choices in response"))
    }

    async fn embed(&self, credential: &str, model: &str, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest { model, input: text };

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(Self::headers(credential))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let response = Self::check_status(response).await?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ExamForgeError::malformed("embedding", e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| ExamForgeError::malformed("embedding", "no data rows in response"))
    }
}
