use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_summarized: AtomicU64,
    empty_documents: AtomicU64,
    chunks_total: AtomicU64,
    chunks_selected: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summarized document with its chunk count and the number of chunks selected.
    pub fn record_document(&self, chunks_total: u64, chunks_selected: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.chunks_total.fetch_add(chunks_total, Ordering::Relaxed);
        self.chunks_selected
            .fetch_add(chunks_selected, Ordering::Relaxed);
    }

    /// Record a document that produced no chunks.
    pub fn record_empty(&self) {
        self.empty_documents.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            empty_documents: self.empty_documents.load(Ordering::Relaxed),
            chunks_total: self.chunks_total.load(Ordering::Relaxed),
            chunks_selected: self.chunks_selected.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents that went through the full pipeline since startup.
    pub documents_summarized: u64,
    /// Documents short-circuited because no content was extracted.
    pub empty_documents: u64,
    /// Chunks produced across all summarized documents.
    pub chunks_total: u64,
    /// Chunks forwarded to the summarizer across all documents.
    pub chunks_selected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_chunks() {
        let metrics = PipelineMetrics::new();
        metrics.record_document(12, 6);
        metrics.record_document(3, 3);
        metrics.record_empty();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_summarized, 2);
        assert_eq!(snapshot.empty_documents, 1);
        assert_eq!(snapshot.chunks_total, 15);
        assert_eq!(snapshot.chunks_selected, 9);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(PipelineMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
