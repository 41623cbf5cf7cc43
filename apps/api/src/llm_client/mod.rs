//! Gemini client — the single point of entry for all AI provider calls.
//!
//! ARCHITECTURAL RULE: no other module may call the Gemini API directly.
//! The orchestration layer depends on the [`EmbeddingClient`] and
//! [`CompletionClient`] traits, never on `GeminiClient` itself, so tests
//! can substitute stub providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_RETRIES: u32 = 3;
/// Client-side cap on a single provider round-trip. The completion call is the
/// long-pole of solution generation and the upstream API specifies no timeout.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Provider-level hint passed through on embedding requests. Documents being
/// indexed and queries used to search may get different vector geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider returned empty content")]
    EmptyContent,

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// Text-to-vector contract. A failure here must abort the enclosing
/// operation: a silently wrong or absent embedding degrades retrieval
/// with no visible symptom, so callers never substitute a zero vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, ProviderError>;
}

/// Free-text generation contract. Returns the tagged result as-is; whether a
/// failure aborts or gets substituted with a fallback is the caller's call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ContentParts<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    content: ContentParts<'a>,
    #[serde(rename = "taskType")]
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<ContentParts<'a>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Extracts the text of the first candidate's first text part.
    fn text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .find_map(|p| p.text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini client
// ────────────────────────────────────────────────────────────────────────────

/// Client for the Gemini REST API (`embedContent` and `generateContent`).
/// Retries on 429 and 5xx with exponential backoff.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    embedding_model: String,
    chat_model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, embedding_model: String, chat_model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            embedding_model,
            chat_model,
        }
    }

    /// POSTs `body` to `{model}:{method}` with retry on transient failures.
    async fn post_with_retry<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let url = format!("{GEMINI_BASE_URL}/{model}:{method}");
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Gemini {method} attempt {attempt} failed, retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Gemini API returned {status}: {body}");
                last_error = Some(ProviderError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: R = response.json().await?;
            debug!("Gemini {method} call succeeded");
            return Ok(parsed);
        }

        Err(last_error.unwrap_or(ProviderError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl EmbeddingClient for GeminiClient {
    async fn embed(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, ProviderError> {
        let request = EmbedRequest {
            content: ContentParts {
                parts: vec![TextPart { text }],
            },
            task_type: task_type.as_str(),
        };

        let response: EmbedResponse = self
            .post_with_retry(&self.embedding_model, "embedContent", &request)
            .await?;

        if response.embedding.values.is_empty() {
            return Err(ProviderError::EmptyContent);
        }
        Ok(response.embedding.values)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![ContentParts {
                parts: vec![TextPart { text: prompt }],
            }],
        };

        let response: GenerateResponse = self
            .post_with_retry(&self.chat_model, "generateContent", &request)
            .await?;

        response.text().ok_or(ProviderError::EmptyContent)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
