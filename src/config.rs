//! Configuration types for tables, vector indexes, and full-text ranking.
//!
//! [`TableConfig`] controls table-wide behavior (dimension, default metric,
//! text fields); the per-index parameter structs ([`KdTreeParams`],
//! [`IvfFlatParams`], [`LshParams`]) control the approximate/exact vector
//! indexes created on that table.
//!
//! # Example
//! ```rust
//! use vecdb::{TableConfig, DistanceMetric};
//!
//! let config = TableConfig {
//!     dimension: 384,
//!     metric: DistanceMetric::Cosine,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, VdbError};

/// Distance metric used by a table's default index and inherited by
/// vector indexes unless overridden at creation time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// `sqrt(sum((a_i - b_i)^2))`.
    Euclidean,
    /// `-(a . b)`, expressed as a distance.
    Dot,
}

impl DistanceMetric {
    /// Returns true if this metric requires normalized (unit-length) vectors.
    pub fn requires_normalization(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }
}

/// The kind of vector index backing a named index on a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorIndexKind {
    /// Exhaustive scan, exact results, any metric.
    BruteForce,
    /// Balanced binary space partition, euclidean only.
    KdTree,
    /// Inverted file with flat lists; coarse clustering + probe.
    IvfFlat,
    /// Locality-sensitive hashing via random hyperplane signatures, cosine only.
    Lsh,
}

impl VectorIndexKind {
    /// Returns true if `metric` is a legal pairing for this index kind.
    pub fn compatible_with(&self, metric: DistanceMetric) -> bool {
        match self {
            VectorIndexKind::BruteForce => true,
            VectorIndexKind::KdTree => matches!(metric, DistanceMetric::Euclidean),
            VectorIndexKind::IvfFlat => true,
            VectorIndexKind::Lsh => matches!(metric, DistanceMetric::Cosine),
        }
    }
}

/// Parameters for a [`crate::vector::kdtree::KdTreeIndex`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdTreeParams {
    /// Fraction of tombstoned nodes (of tree size) that triggers a rebuild.
    /// Default: `0.25`.
    pub tombstone_rebuild_ratio: f64,
}

impl Default for KdTreeParams {
    fn default() -> Self {
        Self {
            tombstone_rebuild_ratio: 0.25,
        }
    }
}

/// Parameters for a [`crate::vector::ivf_flat::IvfFlatIndex`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IvfFlatParams {
    /// Number of coarse clusters (`n_lists`). Default: `16`.
    pub n_lists: usize,
    /// Number of lists probed per query (`n_probe`). Default: `4`.
    pub n_probe: usize,
    /// RNG seed for centroid initialization. Default: `42`.
    pub seed: u64,
    /// Maximum Lloyd's-algorithm iterations per training run. Default: `25`.
    pub max_iterations: usize,
    /// Fraction of the last-trained size that must be tombstoned (removed
    /// without retraining) before a retrain is triggered. Default: `0.2`.
    pub tombstone_retrain_ratio: f64,
}

impl Default for IvfFlatParams {
    fn default() -> Self {
        Self {
            n_lists: 16,
            n_probe: 4,
            seed: 42,
            max_iterations: 25,
            tombstone_retrain_ratio: 0.2,
        }
    }
}

impl IvfFlatParams {
    /// Validates that `n_probe <= n_lists`, both are non-zero, and the
    /// retrain ratio is within `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.n_lists == 0 {
            return Err(VdbError::capacity_or_parameter("n_lists must be > 0"));
        }
        if self.n_probe == 0 {
            return Err(VdbError::capacity_or_parameter("n_probe must be > 0"));
        }
        if self.n_probe > self.n_lists {
            return Err(VdbError::capacity_or_parameter(format!(
                "n_probe ({}) must be <= n_lists ({})",
                self.n_probe, self.n_lists
            )));
        }
        if !(0.0..=1.0).contains(&self.tombstone_retrain_ratio) {
            return Err(VdbError::capacity_or_parameter(
                "tombstone_retrain_ratio must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Parameters for a [`crate::vector::lsh::LshIndex`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LshParams {
    /// Number of independent hash tables. Default: `8`.
    pub n_tables: usize,
    /// Number of random hyperplanes (bits) per table. Default: `16`.
    pub n_bits: usize,
    /// RNG seed for hyperplane sampling. Default: `42`.
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            n_tables: 8,
            n_bits: 16,
            seed: 42,
        }
    }
}

impl LshParams {
    /// Validates that table/bit counts are non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.n_tables == 0 {
            return Err(VdbError::capacity_or_parameter("n_tables must be > 0"));
        }
        if self.n_bits == 0 {
            return Err(VdbError::capacity_or_parameter("n_bits must be > 0"));
        }
        Ok(())
    }
}

/// Table-wide configuration: dimension, default metric, and text fields.
///
/// ```rust
/// use vecdb::TableConfig;
///
/// let config = TableConfig {
///     dimension: 128,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct TableConfig {
    /// Fixed embedding dimension D for every record in the table.
    pub dimension: usize,
    /// Default distance metric, used by the implicit `default` brute-force
    /// index and inherited by new indexes unless overridden.
    pub metric: DistanceMetric,
    /// Payload field names whose string content feeds the full-text index.
    pub text_fields: Vec<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            metric: DistanceMetric::Cosine,
            text_fields: Vec::new(),
        }
    }
}

impl TableConfig {
    /// Creates a config for the given dimension, using all other defaults.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`VdbError::CapacityOrParameter`] if `dimension` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VdbError::capacity_or_parameter(
                "dimension must be greater than 0",
            ));
        }
        Ok(())
    }
}
