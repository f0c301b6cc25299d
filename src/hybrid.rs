//! Score fusion between vector distance and full-text relevance.

use std::collections::HashMap;

use crate::config::DistanceMetric;
use crate::types::RecordId;

/// Converts a raw vector distance into a `[0, 1]` similarity, per metric.
pub fn vector_similarity(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        DistanceMetric::Cosine => (1.0 - distance).clamp(0.0, 1.0),
        DistanceMetric::Dot => 1.0 / (1.0 + (distance).exp()),
    }
}

/// Min-max normalizes a set of scores to `[0, 1]`. Every score maps to
/// `1.0` when the set has no spread (a single candidate, or all tied).
pub fn min_max_normalize(scores: &[(RecordId, f32)]) -> HashMap<RecordId, f32> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = scores.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    scores
        .iter()
        .map(|(id, s)| {
            let normalized = if max > min { (s - min) / (max - min) } else { 1.0 };
            (*id, normalized)
        })
        .collect()
}

/// Fuses a vector-distance ranking and a text BM25 ranking into one
/// top-`k` list, per §4.5: similarity-normalize each side, combine with
/// weight `w`, sort descending with ascending-id tie-break.
pub fn fuse(
    vector_distances: &[(RecordId, f32)],
    metric: DistanceMetric,
    text_scores: &[(RecordId, f32)],
    w: f32,
    k: usize,
) -> Vec<(RecordId, f32)> {
    let sim_vec: HashMap<RecordId, f32> = vector_distances
        .iter()
        .map(|(id, d)| (*id, vector_similarity(metric, *d)))
        .collect();
    let sim_text = min_max_normalize(text_scores);

    let mut ids: Vec<RecordId> = sim_vec.keys().chain(sim_text.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut fused: Vec<(RecordId, f32)> = ids
        .into_iter()
        .map(|id| {
            let v = sim_vec.get(&id).copied().unwrap_or(0.0);
            let t = sim_text.get(&id).copied().unwrap_or(0.0);
            (id, w * v + (1.0 - w) * t)
        })
        .collect();

    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    fused.truncate(k);
    fused
}
