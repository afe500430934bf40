//! Maximal marginal relevance selection over scored candidates.
//!
//! MMR picks `k` results from a similarity-ranked candidate pool by
//! repeatedly taking the candidate that maximizes
//!
//! ```text
//! score = w * sim(query, candidate) - (1 - w) * max sim(candidate, selected)
//! ```
//!
//! so `w = 1.0` reduces to pure relevance ranking and lower weights trade
//! relevance for mutual dissimilarity among the selected set.

use crate::stores::ScoredRecord;

/// Cosine similarity between two vectors; 0.0 when either has zero norm or
/// the dimensions disagree.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Select `k` candidates balancing query relevance against diversity.
///
/// Candidates carry their query similarity in `similarity`; their embeddings
/// are read for the pairwise diversity term. Order of the returned set is the
/// selection order (most valuable first).
#[must_use]
pub fn select(
    mut candidates: Vec<ScoredRecord>,
    k: usize,
    diversity_weight: f32,
) -> Vec<ScoredRecord> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }
    let w = diversity_weight.clamp(0.0, 1.0);
    let k = k.min(candidates.len());

    let mut selected: Vec<ScoredRecord> = Vec::with_capacity(k);
    while selected.len() < k && !candidates.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (idx, candidate) in candidates.iter().enumerate() {
            let relevance = candidate.similarity;
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.record.embedding, &s.record.embedding))
                .fold(0.0f32, f32::max);
            let score = w * relevance - (1.0 - w) * redundancy;
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }
        selected.push(candidates.remove(best_idx));
    }
    selected
}
