//! Semantic chunking with a character budget and a sliding overlap.
//!
//! Budgets are measured in Unicode scalar values (`char`s), not bytes or tokens:
//!
//! - `semchunk-rs` splits the trimmed input along its most meaningful boundaries (paragraph
//!   breaks, then line breaks, then whitespace) with a character counter, leaving room for the
//!   overlap inside `max_chars`. Inputs without any boundary are cut at character level.
//! - Every piece is located in the source so chunks stay exact slices of the input with byte
//!   offsets; dropped separators are absorbed by the preceding chunk.
//! - Each chunk after the first is extended backwards by up to `overlap_chars` characters of its
//!   predecessor, snapped forward to a word start and trimmed back into `max_chars`.
//!
//! Every produced chunk is trimmed and non-empty, ends strictly after its predecessor, and the
//! chunks cover the input in order.

use semchunk_rs::Chunker;
use serde::Serialize;

use super::types::ChunkingError;

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 1200;
/// Default number of characters shared by consecutive chunks.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Size parameters for [`chunk_text`], all expressed in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerSettings {
    /// Hard upper bound on the length of a chunk.
    pub max_chars: usize,
    /// Requested overlap between consecutive chunks (clamped to half of `max_chars`).
    pub overlap_chars: usize,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// A bounded, owned slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of the chunk in the produced sequence.
    pub index: usize,
    /// Trimmed chunk text.
    pub text: String,
    /// Byte offset of the chunk text within the chunker input.
    pub start: usize,
    /// Byte offset one past the end of the chunk text within the chunker input.
    pub end: usize,
}

/// Byte range within the trimmed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

/// Split `text` into overlapping, boundary-aligned chunks.
///
/// Returns an empty vector for empty or whitespace-only input, and exactly one chunk (the
/// trimmed input) when the trimmed input fits into `max_chars`.
pub fn chunk_text(text: &str, settings: &ChunkerSettings) -> Result<Vec<Chunk>, ChunkingError> {
    if settings.max_chars == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let leading = text.len() - text.trim_start().len();
    let body = text.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let total = char_count(body);
    if total <= settings.max_chars {
        return Ok(vec![Chunk {
            index: 0,
            text: body.to_string(),
            start: leading,
            end: leading + body.len(),
        }]);
    }

    let overlap = settings.overlap_chars.min(settings.max_chars / 2);
    let base_budget = settings.max_chars - overlap;
    let chunker = Chunker::new(base_budget, Box::new(char_count));
    let pieces = chunker.chunk(body);

    let mut spans = Vec::with_capacity(pieces.len());
    for segment in segments(body, &piece_starts(body, &pieces)) {
        split_to_budget(body, segment, base_budget, &mut spans);
    }

    let mut chunks: Vec<Chunk> = Vec::with_capacity(spans.len());
    for span in apply_overlap(body, &spans, overlap, settings.max_chars) {
        if chunks
            .last()
            .is_some_and(|previous| leading + span.end <= previous.end)
        {
            continue;
        }
        chunks.push(Chunk {
            index: chunks.len(),
            text: body[span.start..span.end].to_string(),
            start: leading + span.start,
            end: leading + span.end,
        });
    }

    tracing::trace!(
        chunks = chunks.len(),
        characters = total,
        max_chars = settings.max_chars,
        overlap,
        "Chunked text"
    );
    Ok(chunks)
}

fn char_count(segment: &str) -> usize {
    segment.chars().count()
}

/// Byte offsets of each piece in `body`, found with a moving cursor.
fn piece_starts(body: &str, pieces: &[String]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(pieces.len());
    let mut cursor = 0;
    for piece in pieces {
        let needle = piece.trim();
        if needle.is_empty() {
            continue;
        }
        match body[cursor..].find(needle) {
            Some(offset) => {
                starts.push(cursor + offset);
                cursor += offset + needle.len();
            }
            None => {
                tracing::trace!(piece = needle, "Piece not found verbatim; merged into previous")
            }
        }
    }
    starts
}

/// Partition `body` at the piece starts so dropped separators stay with the earlier piece.
fn segments(body: &str, starts: &[usize]) -> Vec<Span> {
    let mut bounds = Vec::with_capacity(starts.len() + 1);
    bounds.push(0);
    bounds.extend(starts.iter().copied().filter(|&start| start > 0));

    bounds
        .iter()
        .enumerate()
        .map(|(position, &start)| {
            let next = bounds.get(position + 1).copied().unwrap_or(body.len());
            Span {
                start,
                end: start + body[start..next].trim_end().len(),
            }
        })
        .collect()
}

/// Push `span` onto `out`, cut into pieces of at most `budget` characters.
///
/// Cuts at the last whitespace in reach and hard-cuts tokens longer than the budget.
fn split_to_budget(body: &str, span: Span, budget: usize, out: &mut Vec<Span>) {
    let mut start = span.start;
    while start < span.end {
        let rest = &body[start..span.end];
        let Some((limit, _)) = rest.char_indices().nth(budget) else {
            out.push(Span {
                start,
                end: span.end,
            });
            return;
        };

        let window = &rest[..limit];
        let cut = window
            .rfind(char::is_whitespace)
            .filter(|&at| at > 0)
            .unwrap_or(limit);
        out.push(Span {
            start,
            end: start + window[..cut].trim_end().len(),
        });
        start = span.end - body[start + cut..span.end].trim_start().len();
    }
}

/// Extend every span after the first backwards into its predecessor.
fn apply_overlap(body: &str, spans: &[Span], overlap: usize, max_chars: usize) -> Vec<Span> {
    if overlap == 0 {
        return spans.to_vec();
    }

    let mut overlapped = Vec::with_capacity(spans.len());
    let mut previous: Option<Span> = None;
    for &current in spans {
        let span = match previous {
            Some(previous) => overlapped_span(body, previous, current, overlap, max_chars),
            None => current,
        };
        overlapped.push(span);
        previous = Some(current);
    }
    overlapped
}

fn overlapped_span(
    body: &str,
    previous: Span,
    current: Span,
    overlap: usize,
    max_chars: usize,
) -> Span {
    let tail = back_by_chars(body, previous.start, previous.end, overlap);
    let budget_floor = back_by_chars(body, 0, current.end, max_chars);
    let from = tail.max(budget_floor);
    let start = word_start(body, from, current.start).unwrap_or(current.start);
    Span {
        start,
        end: current.end,
    }
}

/// Byte offset `chars` characters before `end`, never earlier than `floor`.
fn back_by_chars(body: &str, floor: usize, end: usize, chars: usize) -> usize {
    body[floor..end]
        .char_indices()
        .rev()
        .take(chars)
        .last()
        .map_or(end, |(offset, _)| floor + offset)
}

/// First word start in `from..limit`.
fn word_start(body: &str, from: usize, limit: usize) -> Option<usize> {
    let mut after_gap = body[..from]
        .chars()
        .next_back()
        .is_none_or(char::is_whitespace);
    for (offset, character) in body[from..limit].char_indices() {
        if character.is_whitespace() {
            after_gap = true;
        } else if after_gap {
            return Some(from + offset);
        }
    }
    None
}
