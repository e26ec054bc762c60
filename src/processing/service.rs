//! Summarization service coordinating acquisition, chunking, embedding, selection and
//! summarization.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, ensure_count, ensure_uniform_dimension, get_embedding_client},
    ingest::{
        HttpFetcher, SourceError, SourceFetcher, UploadKind, classify_upload, extract_pdf_text,
        extract_txt_text,
    },
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{ChunkerSettings, chunk_text},
        selection::{mmr_select_with_lambda, selection_budget},
        types::{
            Document, INLINE_TEXT_TITLE, InputError, PipelineError, SummarizeRequest,
            SummaryOutcome, SummaryStats, Upload,
        },
    },
    summarization::{
        SummarizationClient, SummarizationRequest, get_summarization_client, summary_word_budget,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the chunk → embed → select → summarize pipeline for one document at a time.
///
/// The service holds only shared clients, immutable settings and atomic counters, so a single
/// instance is built at process start and shared through an `Arc` by every request.
pub struct SummarizeService {
    embedding_client: Arc<dyn EmbeddingClient>,
    summarization_client: Arc<dyn SummarizationClient>,
    fetcher: Arc<dyn SourceFetcher>,
    chunker: ChunkerSettings,
    lambda: f32,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the summarization pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait SummarizeApi: Send + Sync {
    /// Summarize a URL or inline text submission.
    async fn summarize(&self, request: SummarizeRequest) -> Result<SummaryOutcome, PipelineError>;

    /// Summarize an uploaded PDF or text file.
    async fn summarize_upload(
        &self,
        upload: Upload,
        detail: i64,
        temperature: f32,
    ) -> Result<SummaryOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl SummarizeService {
    /// Build the service and its provider clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        tracing::info!("Initializing summarization pipeline");
        let embedding_client = get_embedding_client(config)?;
        let summarization_client = get_summarization_client(config)?;
        let fetcher = Arc::new(HttpFetcher::new(config.request_timeout())?);
        Ok(Self::new(
            embedding_client,
            summarization_client,
            fetcher,
            config.chunker_settings(),
            config.mmr_lambda,
        ))
    }

    /// Assemble a service from explicit components.
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        summarization_client: Arc<dyn SummarizationClient>,
        fetcher: Arc<dyn SourceFetcher>,
        chunker: ChunkerSettings,
        lambda: f32,
    ) -> Self {
        Self {
            embedding_client,
            summarization_client,
            fetcher,
            chunker,
            lambda,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Turn a request into a document. A non-empty URL wins over inline text.
    pub async fn resolve_document(
        &self,
        request: &SummarizeRequest,
    ) -> Result<Document, PipelineError> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        if let Some(url) = url {
            tracing::info!(url, "Fetching document");
            let fetched = self.fetcher.fetch(url).await?;
            return Ok(Document::new(fetched.title, fetched.text));
        }

        match request.text.as_deref() {
            Some(text) if !text.is_empty() => Ok(Document::new(INLINE_TEXT_TITLE, text)),
            _ => Err(InputError::MissingSource.into()),
        }
    }

    /// Extract the text of an upload. The filename becomes the document title.
    pub async fn upload_document(upload: Upload) -> Result<Document, PipelineError> {
        let Upload { filename, bytes } = upload;
        let text = match classify_upload(&filename, &bytes) {
            UploadKind::Pdf => tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                .await
                .map_err(|error| {
                    SourceError::Extraction(format!("PDF worker failed: {error}"))
                })??,
            UploadKind::Text => extract_txt_text(&bytes),
            UploadKind::Binary => {
                return Err(InputError::UnsupportedUpload(filename).into());
            }
        };
        Ok(Document::new(filename, text))
    }

    /// Summarize a document at the given detail level.
    ///
    /// Documents without any chunks short-circuit to [`SummaryOutcome::no_content`] without
    /// contacting either provider.
    pub async fn run(
        &self,
        document: Document,
        detail: i64,
        temperature: f32,
    ) -> Result<SummaryOutcome, PipelineError> {
        let Document { title, raw_text } = document;
        let chunks = chunk_text(&raw_text, &self.chunker)?;

        if chunks.is_empty() {
            self.metrics.record_empty();
            tracing::info!(title = %title, "Document produced no chunks");
            return Ok(SummaryOutcome::no_content(title));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedding_client.generate_embeddings(texts).await?;
        ensure_count(chunks.len(), embeddings.len())?;
        ensure_uniform_dimension(&embeddings)?;

        let k = selection_budget(detail);
        let selected = mmr_select_with_lambda(&embeddings, k, self.lambda);
        tracing::debug!(title = %title, k, ?selected, lambda = self.lambda, "Selected chunks");

        let passages: Vec<String> = selected
            .iter()
            .map(|&index| chunks[index].text.clone())
            .collect();
        let request = SummarizationRequest {
            title: title.clone(),
            passages,
            detail,
            max_words: summary_word_budget(detail),
            temperature,
        };
        let summary = self.summarization_client.generate_summary(request).await?;

        let stats = SummaryStats {
            chunks_total: chunks.len(),
            chunks_used: selected.len(),
        };
        self.metrics
            .record_document(stats.chunks_total as u64, stats.chunks_used as u64);
        tracing::info!(
            title = %title,
            chunks_total = stats.chunks_total,
            chunks_used = stats.chunks_used,
            k,
            detail,
            "Document summarized"
        );

        Ok(SummaryOutcome {
            title,
            summary,
            chunks_used: selected,
            stats,
        })
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl SummarizeApi for SummarizeService {
    async fn summarize(&self, request: SummarizeRequest) -> Result<SummaryOutcome, PipelineError> {
        let document = self.resolve_document(&request).await?;
        self.run(document, request.detail, request.temperature).await
    }

    async fn summarize_upload(
        &self,
        upload: Upload,
        detail: i64,
        temperature: f32,
    ) -> Result<SummaryOutcome, PipelineError> {
        tracing::info!(filename = %upload.filename, bytes = upload.bytes.len(), "Received upload");
        let document = Self::upload_document(upload).await?;
        self.run(document, detail, temperature).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        SummarizeService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClientError, HashingClient};
    use crate::ingest::FetchedSource;
    use crate::processing::types::NO_CONTENT_SUMMARY;
    use crate::summarization::SummarizationClientError;
    use std::sync::Mutex;

    const THREE_SENTENCES: &str = concat!(
        "Graph search explores nodes.\n",
        "Vector stores index embeddings.\n",
        "Summaries cite the key chunks."
    );

    #[derive(Default)]
    struct StubEmbedder {
        calls: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
        shorten_last: bool,
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.lock().expect("lock").push(texts.clone());
            let mut vectors = HashingClient::new(64).generate_embeddings(texts).await?;
            if self.drop_last {
                vectors.pop();
            }
            if self.shorten_last
                && let Some(last) = vectors.last_mut()
            {
                last.pop();
            }
            Ok(vectors)
        }
    }

    #[derive(Default)]
    struct StubSummarizer {
        requests: Mutex<Vec<SummarizationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl SummarizationClient for StubSummarizer {
        async fn generate_summary(
            &self,
            request: SummarizationRequest,
        ) -> Result<String, SummarizationClientError> {
            self.requests.lock().expect("lock").push(request);
            if self.fail {
                return Err(SummarizationClientError::GenerationFailed("boom".into()));
            }
            Ok("stub summary".into())
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedSource, SourceError> {
            self.urls.lock().expect("lock").push(url.to_string());
            Ok(FetchedSource {
                text: THREE_SENTENCES.into(),
                title: "Fetched Title".into(),
            })
        }
    }

    struct Harness {
        embedder: Arc<StubEmbedder>,
        summarizer: Arc<StubSummarizer>,
        fetcher: Arc<StubFetcher>,
        service: SummarizeService,
    }

    fn harness(embedder: StubEmbedder, summarizer: StubSummarizer) -> Harness {
        let embedder = Arc::new(embedder);
        let summarizer = Arc::new(summarizer);
        let fetcher = Arc::new(StubFetcher::default());
        let service = SummarizeService::new(
            embedder.clone(),
            summarizer.clone(),
            fetcher.clone(),
            ChunkerSettings {
                max_chars: 40,
                overlap_chars: 0,
            },
            0.6,
        );
        Harness {
            embedder,
            summarizer,
            fetcher,
            service,
        }
    }

    fn text_request(text: &str) -> SummarizeRequest {
        SummarizeRequest {
            text: Some(text.into()),
            ..SummarizeRequest::default()
        }
    }

    #[tokio::test]
    async fn whitespace_text_returns_no_content_without_provider_calls() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h.service.summarize(text_request("  \n\t ")).await.expect("outcome");

        assert_eq!(outcome, SummaryOutcome::no_content(INLINE_TEXT_TITLE));
        assert_eq!(outcome.summary, NO_CONTENT_SUMMARY);
        assert!(h.embedder.calls.lock().expect("lock").is_empty());
        assert!(h.summarizer.requests.lock().expect("lock").is_empty());
        assert_eq!(h.service.metrics_snapshot().empty_documents, 1);
    }

    #[tokio::test]
    async fn three_chunks_at_default_detail_are_all_used() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .summarize(text_request(THREE_SENTENCES))
            .await
            .expect("outcome");

        assert_eq!(outcome.title, INLINE_TEXT_TITLE);
        assert_eq!(outcome.summary, "stub summary");
        assert_eq!(outcome.stats, SummaryStats { chunks_total: 3, chunks_used: 3 });
        let mut used = outcome.chunks_used.clone();
        used.sort_unstable();
        assert_eq!(used, vec![0, 1, 2]);

        let snapshot = h.service.metrics_snapshot();
        assert_eq!(snapshot.documents_summarized, 1);
        assert_eq!(snapshot.chunks_total, 3);
        assert_eq!(snapshot.chunks_selected, 3);
    }

    #[tokio::test]
    async fn passages_follow_selection_order() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .summarize(SummarizeRequest {
                text: Some(THREE_SENTENCES.into()),
                detail: 7,
                temperature: 0.4,
                ..SummarizeRequest::default()
            })
            .await
            .expect("outcome");

        let chunks = chunk_text(THREE_SENTENCES, &h.service.chunker).expect("chunks");
        let requests = h.summarizer.requests.lock().expect("lock");
        let request = &requests[0];
        let expected: Vec<String> = outcome
            .chunks_used
            .iter()
            .map(|&index| chunks[index].text.clone())
            .collect();
        assert_eq!(request.passages, expected);
        assert_eq!(request.detail, 7);
        assert_eq!(request.max_words, summary_word_budget(7));
        assert_eq!(request.temperature, 0.4);
        assert_eq!(h.embedder.calls.lock().expect("lock")[0].len(), 3);
    }

    #[tokio::test]
    async fn url_takes_precedence_over_text() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .summarize(SummarizeRequest {
                url: Some("https://example.com/paper".into()),
                text: Some("ignored inline text".into()),
                ..SummarizeRequest::default()
            })
            .await
            .expect("outcome");

        assert_eq!(outcome.title, "Fetched Title");
        assert_eq!(
            *h.fetcher.urls.lock().expect("lock"),
            vec!["https://example.com/paper".to_string()]
        );
        assert_eq!(outcome.stats.chunks_total, 3);
    }

    #[tokio::test]
    async fn missing_source_is_an_input_error() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let error = h
            .service
            .summarize(SummarizeRequest {
                url: Some("   ".into()),
                text: Some(String::new()),
                ..SummarizeRequest::default()
            })
            .await
            .expect_err("missing source");

        assert!(matches!(error, PipelineError::Input(InputError::MissingSource)));
    }

    #[tokio::test]
    async fn embedding_count_mismatch_fails_the_request() {
        let h = harness(
            StubEmbedder {
                drop_last: true,
                ..StubEmbedder::default()
            },
            StubSummarizer::default(),
        );

        let error = h
            .service
            .summarize(text_request(THREE_SENTENCES))
            .await
            .expect_err("mismatch");

        assert!(matches!(
            error,
            PipelineError::Embedding(EmbeddingClientError::CountMismatch { expected: 3, actual: 2 })
        ));
        assert!(h.summarizer.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn ragged_embeddings_fail_before_selection() {
        let h = harness(
            StubEmbedder {
                shorten_last: true,
                ..StubEmbedder::default()
            },
            StubSummarizer::default(),
        );

        let error = h
            .service
            .summarize(text_request(THREE_SENTENCES))
            .await
            .expect_err("ragged");

        assert!(matches!(
            error,
            PipelineError::Embedding(EmbeddingClientError::InvalidResponse(_))
        ));
        assert!(h.summarizer.requests.lock().expect("lock").is_empty());
        assert_eq!(h.service.metrics_snapshot().documents_summarized, 0);
    }

    #[tokio::test]
    async fn empty_document_short_circuits_without_provider_calls() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .run(Document::new("notes.txt", ""), 40, 0.2)
            .await
            .expect("outcome");

        assert_eq!(outcome, SummaryOutcome::no_content("notes.txt"));
        assert_eq!(outcome.summary, NO_CONTENT_SUMMARY);
        assert!(outcome.chunks_used.is_empty());
        assert_eq!(outcome.stats, SummaryStats { chunks_total: 0, chunks_used: 0 });
        assert!(h.embedder.calls.lock().expect("lock").is_empty());
        assert!(h.summarizer.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn empty_upload_yields_no_content() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .summarize_upload(
                Upload {
                    filename: "empty.txt".into(),
                    bytes: Vec::new(),
                },
                40,
                0.2,
            )
            .await
            .expect("outcome");

        assert_eq!(outcome, SummaryOutcome::no_content("empty.txt"));
        assert!(h.embedder.calls.lock().expect("lock").is_empty());
        assert!(h.summarizer.requests.lock().expect("lock").is_empty());
        assert_eq!(h.service.metrics_snapshot().empty_documents, 1);
    }

    #[tokio::test]
    async fn summarizer_failure_propagates_and_skips_metrics() {
        let h = harness(
            StubEmbedder::default(),
            StubSummarizer {
                fail: true,
                ..StubSummarizer::default()
            },
        );

        let error = h
            .service
            .summarize(text_request(THREE_SENTENCES))
            .await
            .expect_err("summarizer failure");

        assert!(matches!(error, PipelineError::Summarization(_)));
        assert_eq!(h.service.metrics_snapshot().documents_summarized, 0);
    }

    #[tokio::test]
    async fn text_upload_uses_filename_as_title() {
        let h = harness(StubEmbedder::default(), StubSummarizer::default());

        let outcome = h
            .service
            .summarize_upload(
                Upload {
                    filename: "notes.txt".into(),
                    bytes: THREE_SENTENCES.as_bytes().to_vec(),
                },
                40,
                0.2,
            )
            .await
            .expect("outcome");

        assert_eq!(outcome.title, "notes.txt");
        assert_eq!(outcome.stats.chunks_total, 3);
    }

    #[tokio::test]
    async fn binary_upload_is_rejected() {
        let error = SummarizeService::upload_document(Upload {
            filename: "photo.jpg".into(),
            bytes: vec![0xff, 0xd8, 0xff, 0x00, 0x10],
        })
        .await
        .expect_err("binary");

        assert!(matches!(
            error,
            PipelineError::Input(InputError::UnsupportedUpload(ref name)) if name == "photo.jpg"
        ));
    }

    #[tokio::test]
    async fn broken_pdf_upload_is_an_extraction_error() {
        let error = SummarizeService::upload_document(Upload {
            filename: "paper.pdf".into(),
            bytes: b"not really a pdf".to_vec(),
        })
        .await
        .expect_err("bad pdf");

        assert!(matches!(error, PipelineError::Source(SourceError::Extraction(_))));
    }

    #[test]
    fn builds_from_offline_config() {
        assert!(SummarizeService::from_config(&Config::default()).is_ok());
    }
}
