//! Optional persistent vector index, kept off the summarize path.
//!
//! The [`VectorIndex`] trait exposes exactly two operations, `upsert` and `query`. Two backends
//! exist: [`QdrantIndex`] talks to a Qdrant server over HTTP and [`InMemoryIndex`] keeps
//! everything in process. [`index_texts`] and [`query_texts`] embed through any
//! [`EmbeddingClient`] before delegating to an index.

mod memory;
mod qdrant;

use crate::config::Config;
use crate::embedding::{EmbeddingClient, EmbeddingClientError, ensure_count};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Errors returned by vector index backends.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Texts, vectors and ids were not aligned.
    #[error("Length mismatch: {texts} texts, {vectors} vectors, {ids} ids")]
    LengthMismatch {
        /// Number of texts supplied.
        texts: usize,
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of ids supplied (or generated).
        ids: usize,
    },
    /// Embedding the texts failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
}

/// A single ranked match returned by [`VectorIndex::query`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// Caller-visible identifier supplied (or generated) at upsert time.
    pub id: String,
    /// Stored text, when the backend returned it.
    pub text: Option<String>,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Narrow storage interface for embedded texts.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace `texts` with their `vectors`. Returns the ids used.
    ///
    /// When `ids` is `None`, ids default to `"{collection}-{i}"`.
    async fn upsert(
        &self,
        collection: &str,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, VectorStoreError>;

    /// Return up to `n` hits per query vector, best first.
    async fn query(
        &self,
        collection: &str,
        query_vectors: Vec<Vec<f32>>,
        n: usize,
    ) -> Result<Vec<Vec<QueryHit>>, VectorStoreError>;
}

/// Resolve caller ids (or the positional defaults) and check they align with texts and vectors.
pub(crate) fn resolve_ids(
    collection: &str,
    texts: &[String],
    vectors: &[Vec<f32>],
    ids: Option<Vec<String>>,
) -> Result<Vec<String>, VectorStoreError> {
    let ids = ids.unwrap_or_else(|| {
        (0..texts.len())
            .map(|index| format!("{collection}-{index}"))
            .collect()
    });
    if texts.len() != vectors.len() || texts.len() != ids.len() {
        return Err(VectorStoreError::LengthMismatch {
            texts: texts.len(),
            vectors: vectors.len(),
            ids: ids.len(),
        });
    }
    Ok(ids)
}

/// Embed `texts` and upsert them into `collection`.
pub async fn index_texts(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingClient,
    collection: &str,
    texts: Vec<String>,
    ids: Option<Vec<String>>,
) -> Result<Vec<String>, VectorStoreError> {
    let vectors = embedder.generate_embeddings(texts.clone()).await?;
    ensure_count(texts.len(), vectors.len())?;
    let ids = index.upsert(collection, texts, vectors, ids).await?;
    tracing::info!(collection, points = ids.len(), "Texts indexed");
    Ok(ids)
}

/// Embed query `texts` and return the top `n` hits for each.
pub async fn query_texts(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingClient,
    collection: &str,
    texts: Vec<String>,
    n: usize,
) -> Result<Vec<Vec<QueryHit>>, VectorStoreError> {
    let expected = texts.len();
    let vectors = embedder.generate_embeddings(texts).await?;
    ensure_count(expected, vectors.len())?;
    index.query(collection, vectors, n).await
}

/// Build the index selected by configuration: Qdrant when `QDRANT_URL` is set, otherwise an
/// in-process index.
pub fn get_vector_index(config: &Config) -> Result<Arc<dyn VectorIndex>, VectorStoreError> {
    match config.qdrant_url.as_deref() {
        Some(url) => Ok(Arc::new(QdrantIndex::new(
            url,
            config.qdrant_api_key.clone(),
            config.request_timeout(),
        )?)),
        None => {
            tracing::warn!("QDRANT_URL not set; using a non-persistent in-memory index");
            Ok(Arc::new(InMemoryIndex::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingClient;

    #[test]
    fn resolve_ids_defaults_to_positional_names() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vec![1.0], vec![0.0]];
        let ids = resolve_ids("papers", &texts, &vectors, None).expect("ids");
        assert_eq!(ids, vec!["papers-0", "papers-1"]);
    }

    #[test]
    fn resolve_ids_rejects_misaligned_input() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let error = resolve_ids("papers", &texts, &[vec![1.0]], None).expect_err("mismatch");
        assert!(matches!(
            error,
            VectorStoreError::LengthMismatch { texts: 2, vectors: 1, ids: 2 }
        ));
    }

    #[tokio::test]
    async fn indexed_texts_are_searchable() {
        let index = InMemoryIndex::new();
        let embedder = HashingClient::new(256);

        let ids = index_texts(
            &index,
            &embedder,
            "notes",
            vec![
                "rust ownership and borrowing rules".into(),
                "baking sourdough bread at home".into(),
            ],
            None,
        )
        .await
        .expect("index");
        assert_eq!(ids, vec!["notes-0", "notes-1"]);

        let hits = query_texts(
            &index,
            &embedder,
            "notes",
            vec!["borrowing rules in rust".into()],
            1,
        )
        .await
        .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].len(), 1);
        assert_eq!(hits[0][0].id, "notes-0");
    }

    #[test]
    fn config_without_qdrant_uses_memory_index() {
        assert!(get_vector_index(&Config::default()).is_ok());
    }
}
