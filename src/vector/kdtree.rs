//! Axis-aligned KD-tree for exact euclidean nearest-neighbor search.
//!
//! The tree is stored as an arena (`Vec<KdNode>` with index-based child
//! links) rather than a pointer tree, so tombstoning a node is a flag flip
//! instead of a tree-shape edit. Insertions after the initial build land in
//! a linear auxiliary buffer that is always fully scanned, per the design
//! note that KD-tree nodes are rebuilt rather than mutated.

use std::collections::HashMap;

use crate::config::KdTreeParams;
use crate::distance;
use crate::types::RecordId;

use super::heap::BoundedTopK;
use super::{oversample_until, RecordFilter, RecordLookup, VectorIndex};

struct KdNode {
    id: RecordId,
    vector: Vec<f32>,
    axis: usize,
    tombstoned: bool,
    left: Option<usize>,
    right: Option<usize>,
}

/// Exact KD-tree vector index, restricted to the euclidean metric.
pub struct KdTreeIndex {
    dimension: usize,
    params: KdTreeParams,
    nodes: Vec<KdNode>,
    root: Option<usize>,
    id_to_node: HashMap<RecordId, usize>,
    tombstones: usize,
    aux: Vec<(RecordId, Vec<f32>)>,
}

impl KdTreeIndex {
    /// Creates an empty KD-tree for vectors of the given dimension.
    pub fn new(dimension: usize, params: KdTreeParams) -> Self {
        Self {
            dimension,
            params,
            nodes: Vec::new(),
            root: None,
            id_to_node: HashMap::new(),
            tombstones: 0,
            aux: Vec::new(),
        }
    }

    fn live_tree_size(&self) -> usize {
        self.nodes.len().saturating_sub(self.tombstones)
    }

    /// True once the tombstone ratio or auxiliary buffer size crosses the
    /// configured rebuild thresholds.
    pub fn needs_rebuild(&self) -> bool {
        let tree_total = self.nodes.len();
        if tree_total > 0 {
            let ratio = self.tombstones as f64 / tree_total as f64;
            if ratio > self.params.tombstone_rebuild_ratio {
                return true;
            }
        }
        let n = (self.live_tree_size() + self.aux.len()).max(1) as f64;
        self.aux.len() as f64 > n.sqrt()
    }

    fn build(
        items: &mut [(RecordId, Vec<f32>)],
        depth: usize,
        dimension: usize,
        arena: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        let axis = depth % dimension;
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| {
            a.1[axis].partial_cmp(&b.1[axis]).unwrap()
        });
        let (left_items, rest) = items.split_at_mut(mid);
        let (median, right_items) = rest.split_first_mut().unwrap();
        let left = Self::build(left_items, depth + 1, dimension, arena);
        let right = Self::build(right_items, depth + 1, dimension, arena);
        arena.push(KdNode {
            id: median.0,
            vector: median.1.clone(),
            axis,
            tombstoned: false,
            left,
            right,
        });
        Some(arena.len() - 1)
    }

    fn search_node(&self, idx: Option<usize>, query: &[f32], topk: &mut BoundedTopK) {
        let Some(i) = idx else { return };
        let node = &self.nodes[i];
        if !node.tombstoned {
            let dist = distance::euclidean(query, &node.vector);
            topk.push(node.id, dist);
        }
        let diff = query[node.axis] - node.vector[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        self.search_node(near, query, topk);
        let should_visit_far = match topk.worst_distance() {
            Some(worst) => diff.abs() <= worst,
            None => true,
        };
        if should_visit_far {
            self.search_node(far, query, topk);
        }
    }

    fn raw_topk(&self, query: &[f32], k: usize) -> Vec<(RecordId, f32)> {
        let mut topk = BoundedTopK::new(k);
        self.search_node(self.root, query, &mut topk);
        for (id, vector) in &self.aux {
            topk.push(*id, distance::euclidean(query, vector));
        }
        topk.into_sorted_vec()
    }
}

impl VectorIndex for KdTreeIndex {
    fn insert(&mut self, id: RecordId, vector: &[f32]) {
        self.remove(id);
        self.aux.push((id, vector.to_vec()));
    }

    fn remove(&mut self, id: RecordId) {
        if let Some(pos) = self.aux.iter().position(|(existing, _)| *existing == id) {
            self.aux.remove(pos);
            return;
        }
        if let Some(&idx) = self.id_to_node.get(&id) {
            if !self.nodes[idx].tombstoned {
                self.nodes[idx].tombstoned = true;
                self.tombstones += 1;
            }
            self.id_to_node.remove(&id);
        }
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&RecordFilter<'_>>,
        _lookup: &RecordLookup<'_>,
    ) -> Vec<(RecordId, f32)> {
        let live_size = self.live_tree_size() + self.aux.len();
        match filter {
            None => self.raw_topk(query, k),
            Some(f) => oversample_until(k, live_size, |k_prime| {
                let mut filtered: Vec<_> = self
                    .raw_topk(query, k_prime)
                    .into_iter()
                    .filter(|(id, _)| f(*id))
                    .collect();
                filtered.truncate(k);
                filtered
            }),
        }
    }

    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]) {
        let mut items = live.to_vec();
        let mut arena = Vec::with_capacity(items.len());
        self.root = Self::build(&mut items, 0, self.dimension, &mut arena);
        self.id_to_node = arena
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id, idx))
            .collect();
        self.nodes = arena;
        self.tombstones = 0;
        self.aux.clear();
    }

    fn len(&self) -> usize {
        self.live_tree_size() + self.aux.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn grid_fixture() -> (KdTreeIndex, StdHashMap<RecordId, Vec<f32>>) {
        let mut index = KdTreeIndex::new(2, KdTreeParams::default());
        let mut live = Vec::new();
        let mut store = StdHashMap::new();
        let mut id = 0u64;
        for x in 0..10 {
            for y in 0..10 {
                let v = vec![x as f32, y as f32];
                live.push((RecordId::new(id), v.clone()));
                store.insert(RecordId::new(id), v);
                id += 1;
            }
        }
        index.rebuild(&live);
        (index, store)
    }

    #[test]
    fn test_kdtree_prune_scenario() {
        let (index, store) = grid_fixture();
        let lookup = |id: RecordId| store.get(&id).cloned();
        let query = [4.2, 5.1];
        let results = index.search(&query, 3, None, &lookup);
        assert_eq!(results.len(), 3);
        let expected_points: Vec<(f32, f32)> = vec![(4.0, 5.0), (5.0, 5.0), (4.0, 6.0)];
        for (id, dist) in &results {
            let v = store.get(id).unwrap();
            let expected_dist = distance::euclidean(&query, v);
            assert!((dist - expected_dist).abs() < 1e-5);
        }
        let mut ordered_by_dist: Vec<f32> = results.iter().map(|(_, d)| *d).collect();
        let mut sorted = ordered_by_dist.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(ordered_by_dist, sorted);
        let _ = expected_points;
    }

    #[test]
    fn test_insert_after_build_lands_in_aux_and_is_found() {
        let (mut index, mut store) = grid_fixture();
        let new_id = RecordId::new(999);
        let v = vec![4.1, 5.05];
        index.insert(new_id, &v);
        store.insert(new_id, v.clone());
        let lookup = |id: RecordId| store.get(&id).cloned();
        let results = index.search(&[4.1, 5.05], 1, None, &lookup);
        assert_eq!(results[0].0, new_id);
    }

    #[test]
    fn test_remove_tombstones_tree_node() {
        let (mut index, store) = grid_fixture();
        let target = RecordId::new(45);
        index.remove(target);
        assert_eq!(index.len(), 99);
        let lookup = |id: RecordId| store.get(&id).cloned();
        let results = index.search(&[0.0, 0.0], 100, None, &lookup);
        assert!(!results.iter().any(|(id, _)| *id == target));
    }

    #[test]
    fn test_needs_rebuild_after_many_removals() {
        let (mut index, _store) = grid_fixture();
        for i in 0..30 {
            index.remove(RecordId::new(i));
        }
        assert!(index.needs_rebuild());
    }

    #[test]
    fn test_filter_pushdown_oversamples() {
        let (index, store) = grid_fixture();
        let lookup = |id: RecordId| store.get(&id).cloned();
        let filter = |id: RecordId| id.get() % 10 == 0;
        let results = index.search(&[4.2, 5.1], 3, Some(&filter), &lookup);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(id, _)| id.get() % 10 == 0));
    }
}
