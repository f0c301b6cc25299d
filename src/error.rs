//! Error types for vecdb-core.
//!
//! vecdb-core uses a single flat error enum returned by every public API:
//! `VdbError`. Each variant corresponds to one of the error kinds of the
//! retrieval core and carries the structured data needed to explain the
//! failure.
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use vecdb::{Table, Result};
//!
//! fn example(table: &Table) -> Result<()> {
//!     table.add(Default::default(), Some(vec![0.0, 1.0]))?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for vecdb-core operations.
pub type Result<T> = std::result::Result<T, VdbError>;

/// Top-level error enum for all vecdb-core operations.
///
/// This is the only error type returned by public APIs. All errors are
/// fatal to the operation that produced them; partial state is rolled back
/// by the caller (see [`crate::table::Table`]). Use pattern matching or the
/// `is_*` predicates to handle specific error categories.
#[derive(Debug, Error)]
pub enum VdbError {
    /// A vector's length does not match the table's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension configured for the table.
        expected: usize,
        /// Actual length of the vector that was supplied.
        got: usize,
    },

    /// A vector or query component is NaN or infinite.
    #[error("numeric domain error: {reason}")]
    NumericDomain {
        /// Description of which component failed and why.
        reason: String,
    },

    /// An operation targeted a record ID that does not exist in the store.
    #[error("unknown record id: {0}")]
    UnknownId(u64),

    /// `use_index`/`create_*_index` referred to an absent or duplicate name.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// The requested index type/metric combination is not legal.
    #[error("incompatible index '{index}': {reason}")]
    IncompatibleIndex {
        /// Name of the index involved.
        index: String,
        /// Why the combination is illegal.
        reason: String,
    },

    /// A payload field violated the table's schema.
    #[error("schema violation on field '{field}': {reason}")]
    SchemaViolation {
        /// Name of the offending field.
        field: String,
        /// Description of the violation.
        reason: String,
    },

    /// Auto-embedding was requested but the payload has no usable `text` field.
    #[error("embedding missing: {reason}")]
    EmbeddingMissing {
        /// Description of what was expected.
        reason: String,
    },

    /// A capacity or parameter constraint was violated (e.g. `n_probe > n_lists`).
    #[error("invalid parameter: {reason}")]
    CapacityOrParameter {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl VdbError {
    /// Creates a [`VdbError::DimensionMismatch`].
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates a [`VdbError::NumericDomain`].
    pub fn numeric_domain(reason: impl Into<String>) -> Self {
        Self::NumericDomain {
            reason: reason.into(),
        }
    }

    /// Creates a [`VdbError::UnknownId`].
    pub fn unknown_id(id: u64) -> Self {
        Self::UnknownId(id)
    }

    /// Creates a [`VdbError::UnknownIndex`].
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::UnknownIndex(name.into())
    }

    /// Creates a [`VdbError::IncompatibleIndex`].
    pub fn incompatible_index(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IncompatibleIndex {
            index: index.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`VdbError::SchemaViolation`].
    pub fn schema_violation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`VdbError::EmbeddingMissing`].
    pub fn embedding_missing(reason: impl Into<String>) -> Self {
        Self::EmbeddingMissing {
            reason: reason.into(),
        }
    }

    /// Creates a [`VdbError::CapacityOrParameter`].
    pub fn capacity_or_parameter(reason: impl Into<String>) -> Self {
        Self::CapacityOrParameter {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a dimension mismatch error.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }

    /// Returns true if this is a numeric domain error (NaN/infinity).
    pub fn is_numeric_domain(&self) -> bool {
        matches!(self, Self::NumericDomain { .. })
    }

    /// Returns true if this is an unknown-record-id error.
    pub fn is_unknown_id(&self) -> bool {
        matches!(self, Self::UnknownId(_))
    }

    /// Returns true if this is an unknown-index error.
    pub fn is_unknown_index(&self) -> bool {
        matches!(self, Self::UnknownIndex(_))
    }

    /// Returns true if this is an incompatible-index error.
    pub fn is_incompatible_index(&self) -> bool {
        matches!(self, Self::IncompatibleIndex { .. })
    }

    /// Returns true if this is a schema violation error.
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }

    /// Returns true if this is a missing-embedding error.
    pub fn is_embedding_missing(&self) -> bool {
        matches!(self, Self::EmbeddingMissing { .. })
    }

    /// Returns true if this is a capacity/parameter error.
    pub fn is_capacity_or_parameter(&self) -> bool {
        matches!(self, Self::CapacityOrParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = VdbError::dimension_mismatch(384, 768);
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 768");
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_unknown_id_display() {
        let err = VdbError::unknown_id(42);
        assert_eq!(err.to_string(), "unknown record id: 42");
        assert!(err.is_unknown_id());
        assert!(!err.is_unknown_index());
    }

    #[test]
    fn test_unknown_index_display() {
        let err = VdbError::unknown_index("by_author");
        assert_eq!(err.to_string(), "unknown index: by_author");
        assert!(err.is_unknown_index());
    }

    #[test]
    fn test_incompatible_index_display() {
        let err = VdbError::incompatible_index("kd_main", "KDTree requires euclidean metric");
        assert_eq!(
            err.to_string(),
            "incompatible index 'kd_main': KDTree requires euclidean metric"
        );
        assert!(err.is_incompatible_index());
    }

    #[test]
    fn test_schema_violation_display() {
        let err = VdbError::schema_violation("age", "expected integer, got string");
        assert!(err.is_schema_violation());
        assert!(!err.is_embedding_missing());
    }

    #[test]
    fn test_embedding_missing_display() {
        let err = VdbError::embedding_missing("add() omitted a vector and payload has no 'text' field");
        assert!(err.is_embedding_missing());
    }

    #[test]
    fn test_capacity_or_parameter_display() {
        let err = VdbError::capacity_or_parameter("n_probe (10) must be <= n_lists (8)");
        assert!(err.is_capacity_or_parameter());
        assert!(!err.is_numeric_domain());
    }

    #[test]
    fn test_numeric_domain_display() {
        let err = VdbError::numeric_domain("component 3 is NaN");
        assert_eq!(err.to_string(), "numeric domain error: component 3 is NaN");
        assert!(err.is_numeric_domain());
    }
}
