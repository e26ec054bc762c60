//! HTTP surface for the summarizer.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /healthz` – Liveness probe returning `{ "ok": true }`.
//! - `POST /api/summarize` – Summarize a URL or inline text. Accepts `url`, `text`, `detail`
//!   (default 40) and `temperature` (default 0.2) and returns the title, summary, selected chunk
//!   indices and chunk counters.
//! - `POST /api/upload` – Multipart upload of a PDF or text `file` with optional `detail` and
//!   `temperature` form fields. Same response shape as `/api/summarize`.
//! - `GET /metrics` – Pipeline counters.
//!
//! Failures, malformed JSON bodies included, are returned as `{ "error": "<message>" }` with a
//! status code derived from the error kind.

use crate::ingest::{MAX_SOURCE_BYTES, SourceError};
use crate::processing::{
    InputError, PipelineError, SummarizeApi, SummarizeRequest, SummaryOutcome, Upload,
    types::{DEFAULT_DETAIL, DEFAULT_TEMPERATURE},
};
use crate::metrics::MetricsSnapshot;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Build the HTTP router exposing the summarization API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: SummarizeApi + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/summarize", post(summarize::<S>))
        .route("/api/upload", post(upload::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_SOURCE_BYTES))
        .with_state(service)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Request body for `POST /api/summarize`.
#[derive(Deserialize)]
struct SummarizeBody {
    /// Remote document to fetch; wins over `text`.
    #[serde(default)]
    url: Option<String>,
    /// Inline document text.
    #[serde(default)]
    text: Option<String>,
    #[serde(default = "default_detail")]
    detail: i64,
    #[serde(default = "default_temperature")]
    temperature: f32,
}

fn default_detail() -> i64 {
    DEFAULT_DETAIL
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Summarize a URL or inline text submission.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<SummarizeBody>, JsonRejection>,
) -> Result<Json<SummaryOutcome>, AppError>
where
    S: SummarizeApi,
{
    let Json(body) = payload.map_err(AppError::rejected)?;
    let request = SummarizeRequest {
        url: body.url,
        text: body.text,
        detail: body.detail,
        temperature: body.temperature,
    };
    let outcome = service.summarize(request).await?;
    tracing::info!(
        title = %outcome.title,
        chunks_total = outcome.stats.chunks_total,
        chunks_used = outcome.stats.chunks_used,
        "Summarize request completed"
    );
    Ok(Json(outcome))
}

/// Summarize an uploaded PDF or text file.
async fn upload<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<SummaryOutcome>, AppError>
where
    S: SummarizeApi,
{
    let mut file: Option<Upload> = None;
    let mut detail = DEFAULT_DETAIL;
    let mut temperature = DEFAULT_TEMPERATURE;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::trim)
                    .filter(|filename| !filename.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| InputError::InvalidForm("'file' part has no filename".into()))?;
                let bytes = field.bytes().await.map_err(invalid_form)?;
                file = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "detail" => detail = parse_field(&name, field.text().await.map_err(invalid_form)?)?,
            "temperature" => {
                temperature = parse_field(&name, field.text().await.map_err(invalid_form)?)?;
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let upload = file.ok_or_else(|| InputError::InvalidForm("missing 'file' part".into()))?;
    let outcome = service.summarize_upload(upload, detail, temperature).await?;
    tracing::info!(
        title = %outcome.title,
        chunks_total = outcome.stats.chunks_total,
        chunks_used = outcome.stats.chunks_used,
        "Upload request completed"
    );
    Ok(Json(outcome))
}

fn invalid_form(error: impl std::fmt::Display) -> AppError {
    InputError::InvalidForm(error.to_string()).into()
}

fn parse_field<T: std::str::FromStr>(name: &str, value: String) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_form(format!("'{name}' has invalid value '{value}'")))
}

/// Return pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: SummarizeApi,
{
    Json(service.metrics_snapshot())
}

enum AppError {
    Pipeline(PipelineError),
    /// Request body the JSON extractor refused.
    Rejected {
        status: StatusCode,
        message: String,
    },
}

impl AppError {
    fn rejected(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }

    fn status(&self) -> StatusCode {
        let error = match self {
            Self::Pipeline(error) => error,
            Self::Rejected { status, .. } => return *status,
        };
        match error {
            PipelineError::Input(_) => StatusCode::BAD_REQUEST,
            PipelineError::Source(SourceError::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Source(SourceError::Fetch(_))
            | PipelineError::Embedding(_)
            | PipelineError::Summarization(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Chunking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Pipeline(error) => error.to_string(),
            Self::Rejected { message, .. } => message,
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<PipelineError>,
{
    fn from(inner: E) -> Self {
        Self::Pipeline(inner.into())
    }
}
