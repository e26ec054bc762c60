//! Source acquisition: fetch URLs, decode uploads and normalize the resulting text.

mod html;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

pub use html::{HtmlText, bytes_look_like_html, html_to_text};

/// Largest upload or fetched document accepted, in bytes.
pub const MAX_SOURCE_BYTES: usize = 25 * 1024 * 1024;

/// Bytes inspected when deciding whether an upload is binary.
const SNIFF_WINDOW: usize = 8192;
const UTF8_BOM: &str = "\u{feff}";

/// Errors raised while acquiring document text.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Remote document could not be retrieved.
    #[error("Failed to fetch {0}")]
    Fetch(String),
    /// Document bytes could not be turned into text.
    #[error("Failed to extract text: {0}")]
    Extraction(String),
}

/// Text and title acquired from a remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    /// Normalized readable text.
    pub text: String,
    /// Page `<title>`, or the URL when the page has none.
    pub title: String,
}

/// Retrieves remote documents by URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Download `url` and return its readable text and title.
    async fn fetch(&self, url: &str) -> Result<FetchedSource, SourceError>;
}

/// [`SourceFetcher`] backed by reqwest. Handles HTML, PDF and plain-text responses.
pub struct HttpFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let http = Client::builder()
            .user_agent(concat!("mmr-summarizer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|error| SourceError::Fetch(format!("HTTP client setup: {error}")))?;
        Ok(Self {
            http,
            max_bytes: MAX_SOURCE_BYTES,
        })
    }

    /// Override the response size cap (defaults to [`MAX_SOURCE_BYTES`]).
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn read_capped(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, SourceError> {
        let too_large =
            || SourceError::Fetch(format!("{url}: response exceeds {} bytes", self.max_bytes));
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| SourceError::Fetch(format!("{url}: {error}")))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedSource, SourceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| SourceError::Fetch(format!("{url}: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Fetch(format!("{url}: server returned {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let bytes = self.read_capped(url, response).await?;

        tracing::debug!(url, %content_type, bytes = bytes.len(), "Fetched remote document");

        if content_type.contains("pdf") || bytes_look_like_pdf(&bytes) {
            return Ok(FetchedSource {
                text: extract_pdf_text(&bytes)?,
                title: url.to_string(),
            });
        }

        if content_type.contains("html") || bytes_look_like_html(&bytes) {
            let page = html_to_text(&String::from_utf8_lossy(&bytes))?;
            return Ok(FetchedSource {
                text: normalize_text(&page.text),
                title: page.title.unwrap_or_else(|| url.to_string()),
            });
        }

        Ok(FetchedSource {
            text: extract_txt_text(&bytes),
            title: url.to_string(),
        })
    }
}

/// How an uploaded file should be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Parse with the PDF extractor.
    Pdf,
    /// Decode as UTF-8 text.
    Text,
    /// Neither text nor PDF.
    Binary,
}

/// Classify an upload by filename extension, falling back to content sniffing.
pub fn classify_upload(filename: &str, bytes: &[u8]) -> UploadKind {
    if filename.to_ascii_lowercase().ends_with(".pdf") || bytes_look_like_pdf(bytes) {
        UploadKind::Pdf
    } else if bytes_look_binary(bytes) {
        UploadKind::Binary
    } else {
        UploadKind::Text
    }
}

/// Magic header check for PDF documents.
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

fn bytes_look_binary(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.contains(&0) {
        return true;
    }
    let decoded = String::from_utf8_lossy(window);
    let total = decoded.chars().count();
    let replaced = decoded.chars().filter(|ch| *ch == char::REPLACEMENT_CHARACTER).count();
    // A truncated multi-byte sequence at the window edge yields one replacement.
    total > 0 && replaced > 1 && replaced * 10 > total
}

/// Extract and normalize the text layer of a PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, SourceError> {
    // pdf-extract panics on some malformed files.
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| SourceError::Extraction("PDF parser aborted on malformed input".into()))?
        .map_err(|error| SourceError::Extraction(format!("unreadable PDF: {error}")))?;
    Ok(normalize_text(&extracted))
}

/// Decode text bytes (UTF-8, lossy), drop a byte-order mark and normalize.
pub fn extract_txt_text(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    normalize_text(decoded.strip_prefix(UTF8_BOM).unwrap_or(&decoded[..]))
}

/// Collapse whitespace runs within lines, keep at most one blank line between paragraphs and
/// drop control characters.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut blank_pending = false;

    for line in text.lines() {
        let collapsed = line
            .split(|ch: char| ch.is_whitespace() || ch.is_control())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if collapsed.is_empty() {
            blank_pending = !normalized.is_empty();
            continue;
        }

        if !normalized.is_empty() {
            normalized.push('\n');
            if blank_pending {
                normalized.push('\n');
            }
        }
        blank_pending = false;
        normalized.push_str(&collapsed);
    }

    normalized
}
