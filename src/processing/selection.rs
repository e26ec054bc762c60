//! Maximal Marginal Relevance (MMR) selection over chunk embeddings.
//!
//! There is no explicit query: relevance is measured against the centroid of all chunk
//! embeddings, so the selector performs diverse extractive selection over the document itself.
//!
//! ```text
//! mmr(i) = λ · cos(e_i, centroid) − (1 − λ) · max_{j ∈ selected} cos(e_i, e_j)
//! ```
//!
//! The selector is a pure function of its inputs. Cosine similarity involving a zero-norm
//! vector is defined as `0`, and non-finite scores never win a comparison, so selection is
//! total over every input and never panics. Ties resolve to the lowest original index.

/// Relevance weight used by [`mmr_select`]; values above `0.5` favor relevance over novelty.
pub const DEFAULT_LAMBDA: f32 = 0.6;

/// Minimum and maximum number of chunks forwarded to the summarizer.
const MIN_BUDGET: i64 = 4;
const MAX_BUDGET: i64 = 10;

/// Number of chunks to keep for a given detail level.
///
/// `k = clamp(3 + floor(detail / 15), 4, 10)`: monotonic and saturating. Negative detail
/// floors like positive detail and clamps to the minimum.
pub fn selection_budget(detail: i64) -> usize {
    let raw = 3_i64.saturating_add(detail.div_euclid(15));
    raw.clamp(MIN_BUDGET, MAX_BUDGET) as usize
}

/// Select up to `k` diverse indices using [`DEFAULT_LAMBDA`].
pub fn mmr_select(embeddings: &[Vec<f32>], k: usize) -> Vec<usize> {
    mmr_select_with_lambda(embeddings, k, DEFAULT_LAMBDA)
}

/// Select up to `k` indices, returned in selection order.
///
/// The result always has `min(k, embeddings.len())` distinct entries. `lambda` is clamped to
/// `[0, 1]`; `1.0` ranks by centroid relevance alone, `0.0` by novelty alone.
pub fn mmr_select_with_lambda(embeddings: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let target = k.min(embeddings.len());
    if target == 0 {
        return Vec::new();
    }
    let lambda = if lambda.is_nan() {
        DEFAULT_LAMBDA
    } else {
        lambda.clamp(0.0, 1.0)
    };

    let centroid = centroid(embeddings);
    let relevance: Vec<f32> = embeddings
        .iter()
        .map(|embedding| cosine_similarity(embedding, &centroid))
        .collect();

    let mut selected = Vec::with_capacity(target);
    let mut remaining: Vec<usize> = (0..embeddings.len()).collect();
    // Highest similarity of each candidate to anything selected so far.
    let mut redundancy = vec![f32::NEG_INFINITY; embeddings.len()];

    let first = argmax(&remaining, |index| relevance[index]);
    take(&mut remaining, &mut selected, first);

    while selected.len() < target && !remaining.is_empty() {
        let newest = selected[selected.len() - 1];
        for &candidate in &remaining {
            let similarity = cosine_similarity(&embeddings[candidate], &embeddings[newest]);
            if similarity > redundancy[candidate] {
                redundancy[candidate] = similarity;
            }
        }

        let next = argmax(&remaining, |index| {
            lambda * relevance[index] - (1.0 - lambda) * redundancy[index]
        });
        take(&mut remaining, &mut selected, next);
    }

    selected
}

/// Cosine similarity of two vectors, `0.0` when either has zero norm.
///
/// Vectors of different lengths are compared over their shared prefix.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (&a, &b) in left.iter().zip(right) {
        let (a, b) = (f64::from(a), f64::from(b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let similarity = dot / denominator;
    if similarity.is_finite() {
        similarity as f32
    } else {
        0.0
    }
}

/// Element-wise mean of all vectors; shorter vectors count as zero-padded.
pub fn centroid(embeddings: &[Vec<f32>]) -> Vec<f32> {
    let dimension = embeddings.iter().map(Vec::len).max().unwrap_or(0);
    if embeddings.is_empty() {
        return Vec::new();
    }
    let mut sums = vec![0.0_f64; dimension];
    for embedding in embeddings {
        for (sum, &value) in sums.iter_mut().zip(embedding) {
            *sum += f64::from(value);
        }
    }
    let count = embeddings.len() as f64;
    sums.into_iter().map(|sum| (sum / count) as f32).collect()
}

/// Index with the highest score; the earliest candidate wins ties and NaN never wins.
fn argmax(candidates: &[usize], score: impl Fn(usize) -> f32) -> usize {
    let mut best = candidates[0];
    let mut best_score = score(best);
    for &candidate in &candidates[1..] {
        let candidate_score = score(candidate);
        if candidate_score > best_score || (best_score.is_nan() && !candidate_score.is_nan()) {
            best = candidate;
            best_score = candidate_score;
        }
    }
    best
}

fn take(remaining: &mut Vec<usize>, selected: &mut Vec<usize>, index: usize) {
    if let Some(position) = remaining.iter().position(|&candidate| candidate == index) {
        remaining.remove(position);
        selected.push(index);
    }
}
