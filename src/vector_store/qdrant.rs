//! HTTP client wrapper for storing and querying chunk vectors in Qdrant.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{QueryHit, VectorIndex, VectorStoreError, resolve_ids};

/// [`VectorIndex`] backed by Qdrant's REST API.
///
/// Qdrant only accepts unsigned integers or UUIDs as point ids, so caller ids are mapped to a
/// deterministic UUID and the original id is stored in the payload under `id`.
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    /// Construct a client for the Qdrant server at `url`.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .user_agent("mmr-summarizer/qdrant")
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(url).map_err(VectorStoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a cosine-distance collection only when it is missing.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: usize,
    ) -> Result<(), VectorStoreError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, vector_size, "Collection created");
        })
        .await
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, VectorStoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(
                    collection = collection_name,
                    error = %error,
                    "Collection existence check failed"
                );
                Err(error)
            }
        }
    }

    async fn query_one(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<QueryHit>, VectorStoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(collection = collection_name, "Query against missing collection");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant query failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points.into_iter().map(QueryPoint::into_hit).collect())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorStoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(
        &self,
        collection: &str,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, VectorStoreError> {
        let ids = resolve_ids(collection, &texts, &vectors, ids)?;
        let Some(vector_size) = vectors.first().map(Vec::len) else {
            return Ok(ids);
        };
        self.create_collection_if_not_exists(collection, vector_size)
            .await?;

        let now = current_timestamp_rfc3339();
        let points: Vec<Value> = ids
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((id, text), vector)| {
                json!({
                    "id": point_uuid(id).to_string(),
                    "vector": vector,
                    "payload": build_payload(id, &text, &now),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, points = point_count, "Points upserted");
        })
        .await?;

        Ok(ids)
    }

    async fn query(
        &self,
        collection: &str,
        query_vectors: Vec<Vec<f32>>,
        n: usize,
    ) -> Result<Vec<Vec<QueryHit>>, VectorStoreError> {
        if n == 0 {
            return Ok(vec![Vec::new(); query_vectors.len()]);
        }
        try_join_all(
            query_vectors
                .into_iter()
                .map(|vector| self.query_one(collection, vector, n)),
        )
        .await
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QueryPoint {
    fn into_hit(self) -> QueryHit {
        let payload = self.payload.unwrap_or_default();
        let id = match payload.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => stringify_point_id(self.id),
        };
        let text = match payload.get("text") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        };
        QueryHit {
            id,
            text,
            score: self.score,
        }
    }
}

/// Deterministic UUID for a caller-supplied id, derived from its SHA-256 digest.
pub(crate) fn point_uuid(id: &str) -> Uuid {
    let digest = Sha256::digest(id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

fn build_payload(id: &str, text: &str, timestamp_rfc3339: &str) -> Value {
    json!({
        "id": id,
        "text": text,
        "text_hash": hex::encode(Sha256::digest(text.as_bytes())),
        "indexed_at": timestamp_rfc3339,
    })
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
