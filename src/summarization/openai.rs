use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SummarizationClient, SummarizationClientError, SummarizationRequest, prompt};

/// Tokens allowed per requested word, leaving headroom for punctuation and markup.
const TOKENS_PER_WORD: usize = 2;

/// Summarizer for OpenAI-compatible `/chat/completions` endpoints (OpenAI, SEA-LION, vLLM, ...).
pub struct OpenAiSummarizationClient {
    http: Client,
    endpoint: String,
    model: String,
}

impl OpenAiSummarizationClient {
    /// Create a client for `base_url`, authenticating with `api_key` when present.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, SummarizationClientError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.as_deref().map(str::trim).filter(|key| !key.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                SummarizationClientError::ProviderUnavailable(
                    "invalid summarization API key".into(),
                )
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = Client::builder()
            .user_agent("mmr-summarizer/summary")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to build HTTP client: {error}"
                ))
            })?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            model,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl SummarizationClient for OpenAiSummarizationClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(request.max_words),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt(&request),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_words.saturating_mul(TOKENS_PER_WORD),
        };

        tracing::debug!(
            model = %self.model,
            passages = request.passages.len(),
            max_words = request.max_words,
            temperature = request.temperature,
            "Requesting chat completion summary"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.endpoint
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "chat completion returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                SummarizationClientError::InvalidResponse(
                    "chat completion contained no summary text".into(),
                )
            })
    }
}
