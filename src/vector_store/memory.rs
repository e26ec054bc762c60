use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{QueryHit, VectorIndex, VectorStoreError, resolve_ids};
use crate::processing::selection::cosine_similarity;

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    text: String,
    vector: Vec<f32>,
}

/// Process-local [`VectorIndex`] with brute-force cosine ranking.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(
        &self,
        collection: &str,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, VectorStoreError> {
        let ids = resolve_ids(collection, &texts, &vectors, ids)?;
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let points = collections.entry(collection.to_string()).or_default();

        for ((id, text), vector) in ids.iter().zip(texts).zip(vectors) {
            let point = StoredPoint {
                id: id.clone(),
                text,
                vector,
            };
            match points.iter_mut().find(|existing| existing.id == *id) {
                Some(existing) => *existing = point,
                None => points.push(point),
            }
        }

        Ok(ids)
    }

    async fn query(
        &self,
        collection: &str,
        query_vectors: Vec<Vec<f32>>,
        n: usize,
    ) -> Result<Vec<Vec<QueryHit>>, VectorStoreError> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let points = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);

        Ok(query_vectors
            .iter()
            .map(|query| {
                let mut hits: Vec<QueryHit> = points
                    .iter()
                    .map(|point| QueryHit {
                        id: point.id.clone(),
                        text: Some(point.text.clone()),
                        score: cosine_similarity(query, &point.vector),
                    })
                    .collect();
                hits.sort_by(|left, right| right.score.total_cmp(&left.score));
                hits.truncate(n);
                hits
            })
            .collect())
    }
}
