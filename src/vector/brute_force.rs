//! Exhaustive exact nearest-neighbor search.
//!
//! Per the crate's ownership design, `BruteForceIndex` does not keep its
//! own copy of each vector — it tracks only the set of live ids and
//! resolves vectors through the `lookup` closure supplied to
//! [`VectorIndex::search`], since the record store already owns them.

use std::collections::BTreeSet;

use crate::config::DistanceMetric;
use crate::distance;
use crate::types::RecordId;

use super::heap::BoundedTopK;
use super::{RecordFilter, RecordLookup, VectorIndex};

/// Exact brute-force vector index.
pub struct BruteForceIndex {
    metric: DistanceMetric,
    live: BTreeSet<RecordId>,
}

impl BruteForceIndex {
    /// Creates an empty brute-force index using `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            live: BTreeSet::new(),
        }
    }

    /// The metric this index scores with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

impl VectorIndex for BruteForceIndex {
    fn insert(&mut self, id: RecordId, _vector: &[f32]) {
        self.live.insert(id);
    }

    fn remove(&mut self, id: RecordId) {
        self.live.remove(&id);
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&RecordFilter<'_>>,
        lookup: &RecordLookup<'_>,
    ) -> Vec<(RecordId, f32)> {
        let mut topk = BoundedTopK::new(k);
        for &id in &self.live {
            if let Some(f) = filter {
                if !f(id) {
                    continue;
                }
            }
            if let Some(vector) = lookup(id) {
                let dist = distance::distance(self.metric, query, &vector);
                topk.push(id, dist);
            }
        }
        topk.into_sorted_vec()
    }

    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]) {
        self.live = live.iter().map(|(id, _)| *id).collect();
    }

    fn len(&self) -> usize {
        self.live.len()
    }
}
