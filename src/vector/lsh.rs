//! Locality-sensitive hashing via random hyperplane signatures, cosine only.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LshParams;
use crate::distance;
use crate::types::RecordId;

use super::heap::BoundedTopK;
use super::{RecordFilter, RecordLookup, VectorIndex};

/// A table's signature bits, packed into a `u64`. `n_bits` beyond 64 are
/// silently not sampled; the default of 16 never comes close.
type Signature = u64;

/// Approximate cosine index backed by `n_tables` independent hyperplane
/// families, each bucketing records by the sign pattern of their dot
/// products with that table's hyperplanes.
pub struct LshIndex {
    dimension: usize,
    params: LshParams,
    hyperplanes: Vec<Vec<Vec<f32>>>,
    tables: Vec<HashMap<Signature, Vec<RecordId>>>,
    vectors: HashMap<RecordId, Vec<f32>>,
}

/// Standard-normal sample via the Box-Muller transform, driven by a
/// caller-supplied seeded RNG for deterministic hyperplane sampling.
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

impl LshIndex {
    /// Creates an LSH index, sampling all hyperplanes up front from the
    /// configured seed.
    pub fn new(dimension: usize, params: LshParams) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let hyperplanes: Vec<Vec<Vec<f32>>> = (0..params.n_tables)
            .map(|_| {
                (0..params.n_bits)
                    .map(|_| (0..dimension).map(|_| standard_normal(&mut rng)).collect())
                    .collect()
            })
            .collect();
        Self {
            dimension,
            tables: vec![HashMap::new(); params.n_tables],
            vectors: HashMap::new(),
            params,
            hyperplanes,
        }
    }

    fn signature(&self, table: usize, vector: &[f32]) -> Signature {
        let mut sig: Signature = 0;
        for (bit, hyperplane) in self.hyperplanes[table].iter().enumerate().take(64) {
            if distance::dot(vector, hyperplane) < 0.0 {
                sig |= 1 << bit;
            }
        }
        sig
    }

    fn candidates(&self, query: &[f32]) -> Vec<RecordId> {
        let mut seen = std::collections::BTreeSet::new();
        for (t, table) in self.tables.iter().enumerate() {
            let sig = self.signature(t, query);
            if let Some(bucket) = table.get(&sig) {
                seen.extend(bucket.iter().copied());
            }
        }
        seen.into_iter().collect()
    }
}

impl VectorIndex for LshIndex {
    fn insert(&mut self, id: RecordId, vector: &[f32]) {
        self.remove(id);
        for t in 0..self.tables.len() {
            let sig = self.signature(t, vector);
            self.tables[t].entry(sig).or_default().push(id);
        }
        self.vectors.insert(id, vector.to_vec());
    }

    fn remove(&mut self, id: RecordId) {
        let Some(vector) = self.vectors.remove(&id) else {
            return;
        };
        for t in 0..self.tables.len() {
            let sig = self.signature(t, &vector);
            if let Some(bucket) = self.tables[t].get_mut(&sig) {
                bucket.retain(|existing| *existing != id);
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
        let mut candidates = self.candidates(query);
        let prefiltered_count = candidates
            .iter()
            .filter(|id| filter.map_or(true, |f| f(**id)))
            .count();
        if prefiltered_count < k {
            candidates = self.vectors.keys().copied().collect();
        }

        let mut topk = BoundedTopK::new(k);
        for id in candidates {
            if let Some(f) = filter {
                if !f(id) {
                    continue;
                }
            }
            if let Some(vector) = self.vectors.get(&id) {
                topk.push(id, distance::cosine(query, vector));
            }
        }
        topk.into_sorted_vec()
    }

    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]) {
        self.tables = vec![HashMap::new(); self.params.n_tables];
        self.vectors.clear();
        for (id, vector) in live {
            for t in 0..self.tables.len() {
                let sig = self.signature(t, vector);
                self.tables[t].entry(sig).or_default().push(*id);
            }
            self.vectors.insert(*id, vector.clone());
        }
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
