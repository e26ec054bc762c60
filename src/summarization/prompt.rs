//! Prompt assembly shared by the remote summarization providers.

use super::SummarizationRequest;

const MIN_SUMMARY_WORDS: i64 = 100;
const MAX_SUMMARY_WORDS: i64 = 800;
const WORDS_PER_DETAIL: i64 = 5;

/// Word budget requested from the summarizer for a detail level.
///
/// `clamp(100 + 5 · detail, 100, 800)`, so the default detail of 40 asks for 300 words.
pub fn summary_word_budget(detail: i64) -> usize {
    let words = detail
        .saturating_mul(WORDS_PER_DETAIL)
        .saturating_add(MIN_SUMMARY_WORDS);
    words.clamp(MIN_SUMMARY_WORDS, MAX_SUMMARY_WORDS) as usize
}

/// System instructions for an academic-style summary bounded by `max_words`.
pub(crate) fn system_prompt(max_words: usize) -> String {
    format!(
        "You summarize documents for busy readers. Use only the supplied excerpts; do not \
         invent facts. Lead with the central claim, then the supporting points, then any \
         limitations the excerpts mention. Write at most {max_words} words of plain prose."
    )
}

/// User message listing the selected excerpts in the order they were chosen.
pub(crate) fn user_prompt(request: &SummarizationRequest) -> String {
    let mut prompt = format!(
        "Summarize the document titled \"{}\" using the excerpts below. \
         Excerpts are ordered from most to least representative.\n\n",
        request.title.trim()
    );
    for (position, passage) in request.passages.iter().enumerate() {
        let text = passage.trim();
        if text.is_empty() {
            continue;
        }
        prompt.push_str(&format!("[Excerpt {}]\n{text}\n\n", position + 1));
    }
    prompt.push_str(&format!(
        "Detail level: {} (higher means more thorough). Target length: {} words.",
        request.detail, request.max_words
    ));
    prompt
}
