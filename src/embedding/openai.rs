use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingClient, EmbeddingClientError, ensure_count, ensure_uniform_dimension};

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// Inputs are split into batches of at most `batch_size` texts. Batches are sent concurrently
/// and stitched back together in input order.
pub struct OpenAiEmbeddingClient {
    http: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddingClient {
    /// Create a client for `base_url`, authenticating with `api_key` when present.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.as_deref().map(str::trim).filter(|key| !key.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                EmbeddingClientError::ProviderUnavailable("invalid embedding API key".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = Client::builder()
            .user_agent("mmr-summarizer/embed")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to build HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            batch_size: batch_size.max(1),
        })
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.endpoint
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "embeddings request failed ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to parse embedding response: {error}"
            ))
        })?;
        parsed.data.sort_by_key(|entry| entry.index);
        ensure_count(inputs.len(), parsed.data.len())?;
        if let Some((position, entry)) = parsed
            .data
            .iter()
            .enumerate()
            .find(|(position, entry)| entry.index != *position)
        {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected embedding index {position}, found {}",
                entry.index
            )));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.model,
            texts = texts.len(),
            batch_size = self.batch_size,
            "Requesting embeddings"
        );

        let batches = try_join_all(
            texts
                .chunks(self.batch_size)
                .map(|batch| self.embed_batch(batch)),
        )
        .await?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        ensure_count(texts.len(), embeddings.len())?;
        ensure_uniform_dimension(&embeddings)?;
        Ok(embeddings)
    }
}
