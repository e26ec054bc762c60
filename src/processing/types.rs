//! Core data types and error definitions for the summarization pipeline.

use crate::embedding::EmbeddingClientError;
use crate::ingest::SourceError;
use crate::summarization::SummarizationClientError;
use serde::Serialize;
use thiserror::Error;

/// Summary text returned when a document yields no chunks.
pub const NO_CONTENT_SUMMARY: &str = "No content extracted.";
/// Title used for inline text submissions.
pub const INLINE_TEXT_TITLE: &str = "Uploaded Text";
/// Detail level applied when the caller does not supply one.
pub const DEFAULT_DETAIL: i64 = 40;
/// Sampling temperature applied when the caller does not supply one.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunker configured with an impossible length budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Caller mistakes detected before any processing happens.
#[derive(Debug, Error)]
pub enum InputError {
    /// Neither a URL nor inline text was supplied.
    #[error("Provide 'url' or 'text'.")]
    MissingSource,
    /// Uploaded file is neither a PDF nor decodable text.
    #[error("Unsupported upload type: {0}")]
    UnsupportedUpload(String),
    /// Multipart body was malformed or lacked a file part.
    #[error("Invalid upload form: {0}")]
    InvalidForm(String),
}

/// Errors emitted by the summarization pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request itself was unusable.
    #[error(transparent)]
    Input(#[from] InputError),
    /// Source acquisition failed.
    #[error("Failed to acquire document: {0}")]
    Source(#[from] SourceError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Summarization provider failed to produce a summary.
    #[error("Failed to generate summary: {0}")]
    Summarization(#[from] SummarizationClientError),
}

/// A single document to summarize, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display title (page title, URL, filename, or [`INLINE_TEXT_TITLE`]).
    pub title: String,
    /// Extracted text prior to chunking.
    pub raw_text: String,
}

impl Document {
    /// Build a document from a title and its text.
    pub fn new(title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Parameters of a `summarize` call with a URL or inline text.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeRequest {
    /// Remote document to fetch; takes precedence over `text`.
    pub url: Option<String>,
    /// Inline document text.
    pub text: Option<String>,
    /// Detail knob driving the chunk budget and summary length.
    pub detail: i64,
    /// Sampling temperature forwarded to the summarizer.
    pub temperature: f32,
}

impl Default for SummarizeRequest {
    fn default() -> Self {
        Self {
            url: None,
            text: None,
            detail: DEFAULT_DETAIL,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// An uploaded file awaiting extraction.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied filename, used as the title and to detect PDFs.
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Chunk counters reported alongside every summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    /// Number of chunks produced for the document.
    pub chunks_total: usize,
    /// Number of chunks forwarded to the summarizer.
    pub chunks_used: usize,
}

/// Result of a pipeline run, serialized verbatim as the HTTP response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryOutcome {
    /// Document title.
    pub title: String,
    /// Generated summary, or [`NO_CONTENT_SUMMARY`].
    pub summary: String,
    /// Selected chunk indices in selection order.
    pub chunks_used: Vec<usize>,
    /// Chunk counters.
    pub stats: SummaryStats,
}

impl SummaryOutcome {
    /// Fixed result for documents that produced no chunks.
    pub fn no_content(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: NO_CONTENT_SUMMARY.to_string(),
            chunks_used: Vec::new(),
            stats: SummaryStats::default(),
        }
    }
}
