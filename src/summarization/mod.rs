//! Summarization providers that turn selected chunks into prose.
//!
//! Three backends are available: a local extractive summarizer (no network), an
//! OpenAI-compatible chat completions endpoint, and an Ollama runtime. Remote providers share
//! the prompt built in [`prompt`]. A provider failure is fatal for the request; there is no
//! fallback to a different backend.

mod extractive;
mod openai;
pub mod prompt;

use crate::config::{Config, SummarizationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use extractive::ExtractiveSummarizer;
pub use openai::OpenAiSummarizationClient;
pub use prompt::summary_word_budget;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced while attempting summarization.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider could not be reached or timed out.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed or was empty.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Input handed to a summarization provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizationRequest {
    /// Document title.
    pub title: String,
    /// Selected chunk texts in selection order.
    pub passages: Vec<String>,
    /// Caller-supplied detail level.
    pub detail: i64,
    /// Word budget derived from the detail level.
    pub max_words: usize,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a summary of the supplied passages.
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Build the summarization client selected by configuration.
pub fn get_summarization_client(
    config: &Config,
) -> Result<Arc<dyn SummarizationClient>, SummarizationClientError> {
    let timeout = config.request_timeout();
    let model = || {
        config.summarization_model.clone().ok_or_else(|| {
            SummarizationClientError::ProviderUnavailable(
                "no summarization model configured".into(),
            )
        })
    };

    let client: Arc<dyn SummarizationClient> = match config.summarization_provider {
        SummarizationProvider::Extractive => Arc::new(ExtractiveSummarizer::new()),
        SummarizationProvider::OpenAI => {
            let base_url = config
                .summarization_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Arc::new(OpenAiSummarizationClient::new(
                base_url,
                config.summarization_api_key.clone(),
                model()?,
                timeout,
            )?)
        }
        SummarizationProvider::Ollama => {
            let base_url = config
                .summarization_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Arc::new(OllamaSummarizationClient::new(base_url, model()?, timeout)?)
        }
    };

    tracing::info!(
        provider = ?config.summarization_provider,
        model = ?config.summarization_model,
        "Summarization client initialized"
    );
    Ok(client)
}

/// Summarizer backed by Ollama's `/api/generate` endpoint.
pub struct OllamaSummarizationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaSummarizationClient {
    /// Create a client for the Ollama runtime at `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("mmr-summarizer/summary")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to build HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl SummarizationClient for OllamaSummarizationClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "model": self.model,
            "system": prompt::system_prompt(request.max_words),
            "prompt": prompt::user_prompt(&request),
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        tracing::debug!(
            model = %self.model,
            passages = request.passages.len(),
            max_words = request.max_words,
            "Requesting Ollama summary"
        );

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        let summary = body.response.trim();
        if summary.is_empty() {
            return Err(SummarizationClientError::InvalidResponse(
                "Ollama returned an empty summary".into(),
            ));
        }
        Ok(summary.to_string())
    }
}
