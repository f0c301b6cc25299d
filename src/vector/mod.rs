//! Vector index abstractions for approximate and exact nearest-neighbor
//! search.
//!
//! This module provides a trait-based contract shared by all four index
//! variants, realized as a tagged union ([`VectorIndexHandle`]) rather than
//! a trait-object hierarchy: the variant set is closed and known up front,
//! so a `match` is simpler and faster than dynamic dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │       VectorIndexHandle           │  (tagged union)
//! └──────────┬───────────────────────┘
//!            │
//!    ┌───────┼────────┬─────────┐
//!    │       │        │         │
//! BruteForce KdTree IvfFlat    Lsh
//! ```
//!
//! The record store is the source of truth for vectors. [`BruteForceIndex`]
//! holds only ids and looks vectors up through the `lookup` closure passed
//! to [`VectorIndex::search`]; the approximate indexes keep their own
//! copies for list locality, per the ownership design in the crate's
//! design notes.

pub mod brute_force;
pub mod heap;
pub mod ivf_flat;
pub mod kdtree;
pub mod lsh;

pub use brute_force::BruteForceIndex;
pub use ivf_flat::IvfFlatIndex;
pub use kdtree::KdTreeIndex;
pub use lsh::LshIndex;

use crate::config::{DistanceMetric, IvfFlatParams, KdTreeParams, LshParams, VectorIndexKind};
use crate::error::Result;
use crate::types::RecordId;

/// A predicate over record ids, used for scalar filter pushdown (§4.2.5).
pub type RecordFilter<'a> = dyn Fn(RecordId) -> bool + 'a;

/// A lookup from record id to its current vector, backed by the record
/// store. Returns `None` if the id is not live.
pub type RecordLookup<'a> = dyn Fn(RecordId) -> Option<Vec<f32>> + 'a;

/// Common contract implemented by every vector index variant.
pub trait VectorIndex {
    /// Inserts or replaces the vector for `id`.
    fn insert(&mut self, id: RecordId, vector: &[f32]);

    /// Removes `id`, no-op if absent. May tombstone rather than physically
    /// delete.
    fn remove(&mut self, id: RecordId);

    /// Returns up to `k` `(id, distance)` pairs in ascending distance,
    /// ties broken by ascending id. `filter`, if present, restricts results
    /// to ids for which it returns `true`; `lookup` resolves a live id to
    /// its current vector for indexes (brute force) that do not keep a copy.
    fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&RecordFilter<'_>>,
        lookup: &RecordLookup<'_>,
    ) -> Vec<(RecordId, f32)>;

    /// Rebuilds internal structure from the current live set, supplied as
    /// `(id, vector)` pairs in live-record order.
    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]);

    /// Number of active (non-tombstoned) vectors.
    fn len(&self) -> usize;

    /// Returns true if the index has no active vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named vector index together with the metadata needed to validate it
/// against a query (its kind and metric).
pub enum VectorIndexHandle {
    /// Exhaustive scan, exact results.
    BruteForce(BruteForceIndex),
    /// Balanced binary space partition, euclidean only.
    KdTree(KdTreeIndex),
    /// Inverted file with flat lists; coarse clustering + probe.
    IvfFlat(IvfFlatIndex),
    /// Locality-sensitive hashing via random hyperplane signatures.
    Lsh(LshIndex),
}

impl VectorIndexHandle {
    /// Creates a brute-force index for the given metric.
    pub fn new_brute_force(metric: DistanceMetric) -> Self {
        Self::BruteForce(BruteForceIndex::new(metric))
    }

    /// Creates a KD-tree index. Fails if `metric` is not euclidean.
    pub fn new_kdtree(dimension: usize, params: KdTreeParams) -> Result<Self> {
        Ok(Self::KdTree(KdTreeIndex::new(dimension, params)))
    }

    /// Creates an IVF-Flat index for the given metric and parameters.
    pub fn new_ivf_flat(
        dimension: usize,
        metric: DistanceMetric,
        params: IvfFlatParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self::IvfFlat(IvfFlatIndex::new(dimension, metric, params)))
    }

    /// Creates an LSH index. Fails if parameters are invalid.
    pub fn new_lsh(dimension: usize, params: LshParams) -> Result<Self> {
        params.validate()?;
        Ok(Self::Lsh(LshIndex::new(dimension, params)))
    }

    /// The index kind, used to validate `use_index` against the active
    /// query mode and metric.
    pub fn kind(&self) -> VectorIndexKind {
        match self {
            Self::BruteForce(_) => VectorIndexKind::BruteForce,
            Self::KdTree(_) => VectorIndexKind::KdTree,
            Self::IvfFlat(_) => VectorIndexKind::IvfFlat,
            Self::Lsh(_) => VectorIndexKind::Lsh,
        }
    }

    /// The metric this index instance was built with.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::BruteForce(i) => i.metric(),
            Self::KdTree(_) => DistanceMetric::Euclidean,
            Self::IvfFlat(i) => i.metric(),
            Self::Lsh(_) => DistanceMetric::Cosine,
        }
    }

    /// Creates an index of `kind` for `metric`, dispatching to the
    /// constructor matching `params`. Fails if `kind` and `metric` are not a
    /// legal pairing, or if `params` is not the variant `kind` expects.
    pub fn create(
        kind: VectorIndexKind,
        dimension: usize,
        metric: DistanceMetric,
        params: VectorIndexParams,
    ) -> Result<Self> {
        if !kind.compatible_with(metric) {
            return Err(crate::error::VdbError::incompatible_index(
                format!("{kind:?}"),
                format!("{kind:?} is not compatible with {metric:?}"),
            ));
        }
        match (kind, params) {
            (VectorIndexKind::BruteForce, VectorIndexParams::BruteForce) => {
                Ok(Self::new_brute_force(metric))
            }
            (VectorIndexKind::KdTree, VectorIndexParams::KdTree(p)) => {
                Self::new_kdtree(dimension, p)
            }
            (VectorIndexKind::IvfFlat, VectorIndexParams::IvfFlat(p)) => {
                Self::new_ivf_flat(dimension, metric, p)
            }
            (VectorIndexKind::Lsh, VectorIndexParams::Lsh(p)) => Self::new_lsh(dimension, p),
            (kind, _) => Err(crate::error::VdbError::capacity_or_parameter(format!(
                "parameters do not match index kind {kind:?}"
            ))),
        }
    }

    /// True if this index's internal structure has crossed its configured
    /// rebuild/retrain threshold and should be rebuilt from the live set.
    pub fn needs_rebuild(&self) -> bool {
        match self {
            Self::BruteForce(_) => false,
            Self::KdTree(i) => i.needs_rebuild(),
            Self::IvfFlat(i) => i.needs_retrain(),
            Self::Lsh(_) => false,
        }
    }
}

/// Parameters for [`VectorIndexHandle::create`], one variant per index kind.
pub enum VectorIndexParams {
    /// No parameters; brute force has none.
    BruteForce,
    /// See [`KdTreeParams`].
    KdTree(KdTreeParams),
    /// See [`IvfFlatParams`].
    IvfFlat(IvfFlatParams),
    /// See [`LshParams`].
    Lsh(LshParams),
}

impl VectorIndex for VectorIndexHandle {
    fn insert(&mut self, id: RecordId, vector: &[f32]) {
        match self {
            Self::BruteForce(i) => i.insert(id, vector),
            Self::KdTree(i) => i.insert(id, vector),
            Self::IvfFlat(i) => i.insert(id, vector),
            Self::Lsh(i) => i.insert(id, vector),
        }
    }

    fn remove(&mut self, id: RecordId) {
        match self {
            Self::BruteForce(i) => i.remove(id),
            Self::KdTree(i) => i.remove(id),
            Self::IvfFlat(i) => i.remove(id),
            Self::Lsh(i) => i.remove(id),
        }
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&RecordFilter<'_>>,
        lookup: &RecordLookup<'_>,
    ) -> Vec<(RecordId, f32)> {
        match self {
            Self::BruteForce(i) => i.search(query, k, filter, lookup),
            Self::KdTree(i) => i.search(query, k, filter, lookup),
            Self::IvfFlat(i) => i.search(query, k, filter, lookup),
            Self::Lsh(i) => i.search(query, k, filter, lookup),
        }
    }

    fn rebuild(&mut self, live: &[(RecordId, Vec<f32>)]) {
        match self {
            Self::BruteForce(i) => i.rebuild(live),
            Self::KdTree(i) => i.rebuild(live),
            Self::IvfFlat(i) => i.rebuild(live),
            Self::Lsh(i) => i.rebuild(live),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::BruteForce(i) => i.len(),
            Self::KdTree(i) => i.len(),
            Self::IvfFlat(i) => i.len(),
            Self::Lsh(i) => i.len(),
        }
    }
}

/// Oversampling strategy for indexes that post-filter rather than push
/// down a scalar predicate (§4.2.5): re-query with a doubled `k` (capped at
/// `live_size`) up to three times before giving up.
pub fn oversample_until<F>(k: usize, live_size: usize, mut attempt: F) -> Vec<(RecordId, f32)>
where
    F: FnMut(usize) -> Vec<(RecordId, f32)>,
{
    let mut k_prime = k;
    let mut result = attempt(k_prime);
    for _ in 0..3 {
        if result.len() >= k || k_prime >= live_size {
            break;
        }
        k_prime = (k_prime * 2).min(live_size);
        result = attempt(k_prime);
    }
    result
}
