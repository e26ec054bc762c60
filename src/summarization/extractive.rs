use async_trait::async_trait;

use super::{SummarizationClient, SummarizationClientError, SummarizationRequest};

const MAX_WORDS_PER_BULLET: usize = 60;

/// Local summarizer that quotes the lead sentence of each selected passage.
///
/// Passages arrive in selection order (most representative first), so the bullets keep that
/// order and the word budget trims the least representative ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveSummarizer;

impl ExtractiveSummarizer {
    /// Construct a new extractive summarizer.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SummarizationClient for ExtractiveSummarizer {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let summary = build_extractive_summary(&request.passages, request.max_words);
        if summary.is_empty() {
            return Err(SummarizationClientError::InvalidResponse(
                "no passages with text to summarize".into(),
            ));
        }
        Ok(summary)
    }
}

/// Build a bullet list bounded by `max_words`; the first bullet is always kept.
pub(crate) fn build_extractive_summary(passages: &[String], max_words: usize) -> String {
    let mut bullets: Vec<String> = Vec::new();
    let mut used_words = 0usize;

    for passage in passages {
        let sentence = truncate_words(first_sentence(passage.trim()), MAX_WORDS_PER_BULLET);
        let words = count_words(&sentence);
        if words == 0 {
            continue;
        }
        if !bullets.is_empty() && used_words + words > max_words {
            break;
        }
        used_words += words;
        bullets.push(format!("- {sentence}"));
    }

    bullets.join("\n")
}

fn first_sentence(text: &str) -> &str {
    let mut previous: Option<char> = None;
    for (offset, ch) in text.char_indices() {
        if ch.is_whitespace() && matches!(previous, Some('.' | '!' | '?')) {
            return &text[..offset];
        }
        previous = Some(ch);
    }
    text
}

fn truncate_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return words.join(" ");
    }
    format!("{}…", words[..limit].join(" "))
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
