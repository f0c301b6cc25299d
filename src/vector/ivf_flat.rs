//! Inverted file index with flat lists (coarse clustering + probe).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{DistanceMetric, IvfFlatParams};
use crate::distance;
use crate::types::RecordId;

use super::heap::BoundedTopK;
use super::{RecordFilter, RecordLookup, VectorIndex};

/// Approximate vector index using coarse-cluster inverted lists.
pub struct IvfFlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    params: IvfFlatParams,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<(RecordId, Vec<f32>)>>,
    id_to_list: HashMap<RecordId, usize>,
    trained: bool,
    pending: Vec<(RecordId, Vec<f32>)>,
    last_train_size: usize,
    tombstones: usize,
}

impl IvfFlatIndex {
    /// Creates an untrained IVF-Flat index. Training happens lazily once
    /// `n_lists` records have been inserted.
    pub fn new(dimension: usize, metric: DistanceMetric, params: IvfFlatParams) -> Self {
        Self {
            dimension,
            metric,
            params,
            centroids: Vec::new(),
            lists: Vec::new(),
            id_to_list: HashMap::new(),
            trained: false,
            pending: Vec::new(),
            last_train_size: 0,
            tombstones: 0,
        }
    }

    /// The metric this index scores with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// True if training has run at least once.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// True if the record count has doubled since the last training, or at
    /// least 20% of trained records have since been removed.
    pub fn needs_retrain(&self) -> bool {
        if !self.trained {
            return false;
        }
        let live = self.len();
        if self.last_train_size > 0 && live >= 2 * self.last_train_size {
            return true;
        }
        self.last_train_size > 0
            && self.tombstones as f64 >= self.params.tombstone_retrain_ratio * self.last_train_size as f64
    }

    fn nearest_centroid(&self, vector: &[f32]) -> usize {
        self.centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, distance::distance(self.metric, vector, c)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn train(&mut self, items: Vec<(RecordId, Vec<f32>)>) {
        let n_lists = self.params.n_lists.min(items.len()).max(1);
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.shuffle(&mut rng);
        let mut centroids: Vec<Vec<f32>> = order[..n_lists]
            .iter()
            .map(|&i| items[i].1.clone())
            .collect();

        let mut assignment = vec![0usize; items.len()];
        for _ in 0..self.params.max_iterations {
            let mut changed = false;
            for (idx, (_, v)) in items.iter().enumerate() {
                let best = centroids
                    .iter()
                    .enumerate()
                    .map(|(c, centroid)| (c, distance::distance(self.metric, v, centroid)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(c, _)| c)
                    .unwrap_or(0);
                if assignment[idx] != best {
                    assignment[idx] = best;
                    changed = true;
                }
            }

            let mut sums = vec![vec![0f32; self.dimension]; n_lists];
            let mut counts = vec![0usize; n_lists];
            for (idx, (_, v)) in items.iter().enumerate() {
                let c = assignment[idx];
                counts[c] += 1;
                for d in 0..self.dimension {
                    sums[c][d] += v[d];
                }
            }
            for c in 0..n_lists {
                if counts[c] > 0 {
                    for d in 0..self.dimension {
                        centroids[c][d] = sums[c][d] / counts[c] as f32;
                    }
                    if self.metric.requires_normalization() {
                        centroids[c] = distance::normalize(&centroids[c]);
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let mut lists = vec![Vec::new(); n_lists];
        let mut id_to_list = HashMap::new();
        for (idx, (id, v)) in items.into_iter().enumerate() {
            let c = assignment[idx];
            id_to_list.insert(id, c);
            lists[c].push((id, v));
        }

        self.last_train_size = lists.iter().map(|l| l.len()).sum();
        self.centroids = centroids;
        self.lists = lists;
        self.id_to_list = id_to_list;
        self.trained = true;
        self.tombstones = 0;
    }

    fn probe(&self, query: &[f32], n_probe: usize) -> Vec<usize> {
        let n_probe = n_probe.min(self.centroids.len()).max(1);
        let mut scored: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, distance::distance(self.metric, query, c)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.into_iter().take(n_probe).map(|(i, _)| i).collect()
    }

    fn raw_topk(
        &self,
        query: &[f32],
        k: usize,
        n_probe: usize,
        filter: Option<&RecordFilter<'_>>,
    ) -> Vec<(RecordId, f32)> {
        let mut topk = BoundedTopK::new(k);
        for list_idx in self.probe(query, n_probe) {
            for (id, v) in &self.lists[list_idx] {
                if let Some(f) = filter {
                    if !f(*id) {
                        continue;
                    }
                }
                topk.push(*id, distance::distance(self.metric, query, v));
            }
        }
        topk.into_sorted_vec()
    }
}

impl VectorIndex for IvfFlatIndex {
    fn insert(&mut self, id: RecordId, vector: &[f32]) {
        self.remove(id);
        if self.trained {
            let list_idx = self.nearest_centroid(vector);
            self.lists[list_idx].push((id, vector.to_vec()));
            self.id_to_list.insert(id, list_idx);
        } else {
            self.pending.push((id, vector.to_vec()));
            if self.pending.len() >= self.params.n_lists {
                let items = std::mem::take(&mut self.pending);
                self.train(items);
            }
        }
    }

    fn remove(&mut self, id: RecordId) {
        if let Some(pos) = self.pending.iter().position(|(existing, _)| *existing == id) {
            self.pending.remove(pos);
            return;
        }
        if let Some(list_idx) = self.id_to_list.remove(&id) {
            if let Some(pos) = self.lists[list_idx]
                .iter()
                .position(|(existing, _)| *existing == id)
            {
                self.lists[list_idx].remove(pos);
                self.tombstones += 1;
            }
        }
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&RecordFilter<'_>>,
        _lookup: &RecordLookup<'_>,
    ) -> Vec<(RecordId, f32)> {
        if !self.trained {
            let mut topk = BoundedTopK::new(k);
            for (id, v) in &self.pending {
                if let Some(f) = filter {
                    if !f(*id) {
                        continue;
                    }
                }
                topk.push(*id, distance::distance(self.metric, query, v));
            }
            return topk.into_sorted_vec();
        }

        let mut n_probe = self.params.n_probe;
        let mut result = self.raw_topk(query, k, n_probe, filter);
        for _ in 0..3 {
            if result.len() >= k || n_probe >= self.centroids.len() {
                break;
            }
            n_probe = (n_probe * 2).min(self.centroids.len());
            result = self.raw_topk(query, k, n_probe, filter);
        }
        result
    }

    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]) {
        self.train(live.to_vec());
        self.pending.clear();
    }

    fn len(&self) -> usize {
        if self.trained {
            self.lists.iter().map(|l| l.len()).sum()
        } else {
            self.pending.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn random_unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let v: Vec<f32> = (0..dim)
                .map(|_| rand::Rng::gen_range(&mut rng, -1.0f32..1.0))
                .collect();
            out.push(distance::normalize(&v));
        }
        out
    }

    #[test]
    fn test_trains_after_n_lists_inserts() {
        let params = IvfFlatParams {
            n_lists: 4,
            n_probe: 2,
            ..Default::default()
        };
        let mut index = IvfFlatIndex::new(8, DistanceMetric::Cosine, params);
        for (i, v) in random_unit_vectors(4, 8, 1).into_iter().enumerate() {
            index.insert(RecordId::new(i as u64), &v);
        }
        assert!(index.is_trained());
    }

    #[test]
    fn test_recall_scenario_against_brute_force() {
        let params = IvfFlatParams {
            n_lists: 8,
            n_probe: 4,
            seed: 42,
            max_iterations: 25,
            tombstone_retrain_ratio: 0.2,
        };
        let dim = 16;
        let vectors = random_unit_vectors(1000, dim, 7);
        let mut index = IvfFlatIndex::new(dim, DistanceMetric::Cosine, params);
        let mut store = StdHashMap::new();
        for (i, v) in vectors.iter().enumerate() {
            let id = RecordId::new(i as u64);
            index.insert(id, v);
            store.insert(id, v.clone());
        }

        let queries = random_unit_vectors(50, dim, 99);
        let lookup = |id: RecordId| store.get(&id).cloned();
        let mut total_recall = 0.0;
        for q in &queries {
            let approx = index.search(q, 10, None, &lookup);
            let mut exact: Vec<(RecordId, f32)> = store
                .iter()
                .map(|(id, v)| (*id, distance::cosine(q, v)))
                .collect();
            exact.sort_by(|a, b| a.1.total_cmp(&b.1));
            exact.truncate(10);
            let exact_ids: std::collections::HashSet<_> = exact.iter().map(|(id, _)| *id).collect();
            let hits = approx.iter().filter(|(id, _)| exact_ids.contains(id)).count();
            total_recall += hits as f64 / 10.0;
        }
        let avg_recall = total_recall / queries.len() as f64;
        assert!(avg_recall >= 0.8, "average recall {avg_recall} below 0.8");
    }

    #[test]
    fn test_remove_increments_tombstones_and_triggers_retrain() {
        let params = IvfFlatParams {
            n_lists: 4,
            n_probe: 2,
            ..Default::default()
        };
        let mut index = IvfFlatIndex::new(4, DistanceMetric::Euclidean, params);
        for i in 0..20u64 {
            index.insert(RecordId::new(i), &[i as f32, 0.0, 0.0, 0.0]);
        }
        for i in 0..5u64 {
            index.remove(RecordId::new(i));
        }
        assert!(index.needs_retrain());
    }

    #[test]
    fn test_deterministic_with_same_seed_and_order() {
        let make = || {
            let params = IvfFlatParams {
                n_lists: 4,
                n_probe: 2,
                seed: 7,
                max_iterations: 10,
                tombstone_retrain_ratio: 0.2,
            };
            let mut index = IvfFlatIndex::new(4, DistanceMetric::Euclidean, params);
            for i in 0..20u64 {
                index.insert(RecordId::new(i), &[(i % 5) as f32, i as f32, 0.0, 0.0]);
            }
            index
        };
        let a = make();
        let b = make();
        assert_eq!(a.centroids, b.centroids);
    }
}
