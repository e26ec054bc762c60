use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingClient, EmbeddingClientError, ensure_count, ensure_uniform_dimension};

/// Embeddings client backed by Ollama's `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client for the Ollama runtime at `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("mmr-summarizer/embed")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
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
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(model = %self.model, texts = texts.len(), "Requesting Ollama embeddings");

        let response = self
            .http
            .post(self.endpoint())
            .json(&EmbedRequest {
                model: &self.model,
                input: &texts,
            })
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EmbeddingClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404 (is the model pulled?)",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama embeddings: {error}"
            ))
        })?;
        ensure_count(texts.len(), body.embeddings.len())?;
        ensure_uniform_dimension(&body.embeddings)?;
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client(server: &MockServer) -> OllamaEmbeddingClient {
        OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic-embed-text".into(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn returns_embeddings_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body_partial(r#"{ "model": "nomic-embed-text", "input": ["x", "y"] }"#);
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.5, 0.5], [1.0, 0.0]] }));
            })
            .await;

        let vectors = client(&server)
            .generate_embeddings(vec!["x".into(), "y".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.5, 0.5], vec![1.0, 0.0]]);
    }

    #[tokio::test]
    async fn missing_model_maps_to_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(404).body("model not found");
            })
            .await;

        let error = client(&server)
            .generate_embeddings(vec!["x".into()])
            .await
            .expect_err("404");
        assert!(matches!(error, EmbeddingClientError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn ragged_dimensions_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.5, 0.5], [1.0]] }));
            })
            .await;

        let error = client(&server)
            .generate_embeddings(vec!["x".into(), "y".into()])
            .await
            .expect_err("ragged");
        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn wrong_vector_count_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [] }));
            })
            .await;

        let error = client(&server)
            .generate_embeddings(vec!["x".into()])
            .await
            .expect_err("mismatch");
        assert!(matches!(
            error,
            EmbeddingClientError::CountMismatch { expected: 1, actual: 0 }
        ));
    }
}
