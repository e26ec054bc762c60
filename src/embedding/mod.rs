//! Embedding clients that map chunk texts to vectors.
//!
//! Every client is length- and order-preserving: `embeddings[i]` belongs to `texts[i]`. A
//! provider that errors, times out, returns the wrong number of vectors, or returns vectors of
//! differing dimension surfaces an [`EmbeddingClientError`] instead of padding with zeros.

mod ollama;
mod openai;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached or timed out.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Fail with [`EmbeddingClientError::CountMismatch`] unless one vector came back per input.
pub fn ensure_count(expected: usize, actual: usize) -> Result<(), EmbeddingClientError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingClientError::CountMismatch { expected, actual })
    }
}

/// Fail with [`EmbeddingClientError::InvalidResponse`] unless every vector shares one non-zero
/// dimension.
pub fn ensure_uniform_dimension(vectors: &[Vec<f32>]) -> Result<(), EmbeddingClientError> {
    let Some(dimension) = vectors.first().map(Vec::len) else {
        return Ok(());
    };
    if dimension == 0 {
        return Err(EmbeddingClientError::InvalidResponse(
            "provider returned an empty vector".into(),
        ));
    }
    match vectors
        .iter()
        .position(|vector| vector.len() != dimension)
    {
        Some(position) => Err(EmbeddingClientError::InvalidResponse(format!(
            "vector {position} has dimension {}, expected {dimension}",
            vectors[position].len()
        ))),
        None => Ok(()),
    }
}

/// Deterministic local embedding client that hashes words into vector slots.
///
/// Useful offline and in tests: identical texts map to identical vectors and texts sharing
/// vocabulary land close together.
pub struct HashingClient {
    dimension: usize,
}

impl HashingClient {
    /// Construct a client producing `dimension`-sized vectors.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for word in text.split_whitespace() {
            let slot = word
                .bytes()
                .fold(0usize, |hash, byte| {
                    hash.wrapping_mul(31).wrapping_add(usize::from(byte))
                })
                % dimension;
            embedding[slot] += 1.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(
            dimension = self.dimension,
            texts = texts.len(),
            "Generating hashed embeddings"
        );

        Ok(texts
            .iter()
            .map(|text| Self::encode(&text.to_lowercase(), self.dimension))
            .collect())
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    let timeout = config.request_timeout();
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Hashing => Arc::new(HashingClient::new(config.embedding_dimension)),
        EmbeddingProvider::OpenAI => {
            let base_url = config
                .embedding_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Arc::new(OpenAiEmbeddingClient::new(
                base_url,
                config.embedding_api_key.clone(),
                config.embedding_model.clone(),
                config.embedding_batch_size,
                timeout,
            )?)
        }
        EmbeddingProvider::Ollama => {
            let base_url = config
                .embedding_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Arc::new(OllamaEmbeddingClient::new(
                base_url,
                config.embedding_model.clone(),
                timeout,
            )?)
        }
    };

    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        "Embedding client initialized"
    );
    Ok(client)
}
