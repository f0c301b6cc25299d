//! Core type definitions: record identifiers and payload scalar values.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Stable, monotonically increasing record identifier. Never reused within
/// a table, even after the record it named has been deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Wraps a raw id value.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic generator of [`RecordId`] values for one table.
///
/// IDs are dense and never reused, per the record-store invariant: even a
/// deleted id is never handed back out.
#[derive(Debug, Default)]
pub struct RecordIdGenerator(AtomicU64);

impl RecordIdGenerator {
    /// Creates a generator that will hand out `0, 1, 2, ...`.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Allocates the next id.
    pub fn next(&self) -> RecordId {
        RecordId(self.0.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// A scalar payload value: the leaves of a record's key/value payload.
///
/// Values are totally ordered so that [`PayloadValue`] can be used as the
/// key type of a scalar B-tree index; ordering across variants is a fixed,
/// arbitrary but stable total order (Null < Bool < Int < Float < String),
/// so mixing types in one index is well-defined but rejected at insertion
/// time by the scalar index itself (see [`crate::scalar::ScalarIndex`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PayloadValue {
    /// Absence of a value for a field under a schema.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Floating point scalar. NaN is rejected wherever payloads are validated.
    Float(f64),
    /// UTF-8 string scalar.
    String(String),
}

impl PayloadValue {
    /// Returns the discriminant rank used for cross-variant ordering.
    fn rank(&self) -> u8 {
        match self {
            PayloadValue::Null => 0,
            PayloadValue::Bool(_) => 1,
            PayloadValue::Int(_) => 2,
            PayloadValue::Float(_) => 3,
            PayloadValue::String(_) => 4,
        }
    }

    /// Returns true if this value and `other` belong to the same scalar
    /// domain (both numeric, both string, ...). Mixed numeric/string
    /// comparisons are rejected by scalar indexes per the spec.
    pub fn same_domain(&self, other: &PayloadValue) -> bool {
        matches!(
            (self, other),
            (PayloadValue::Null, PayloadValue::Null)
                | (PayloadValue::Bool(_), PayloadValue::Bool(_))
                | (PayloadValue::Int(_), PayloadValue::Int(_))
                | (PayloadValue::Float(_), PayloadValue::Float(_))
                | (PayloadValue::Int(_), PayloadValue::Float(_))
                | (PayloadValue::Float(_), PayloadValue::Int(_))
                | (PayloadValue::String(_), PayloadValue::String(_))
        )
    }

    /// Returns this value's best-effort `f64` view, for numeric comparisons
    /// across `Int`/`Float`.
    fn as_f64(&self) -> Option<f64> {
        match self {
            PayloadValue::Int(i) => Some(*i as f64),
            PayloadValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Eq for PayloadValue {}

impl PartialOrd for PayloadValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PayloadValue {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (PayloadValue::Null, PayloadValue::Null) => Ordering::Equal,
            (PayloadValue::Bool(a), PayloadValue::Bool(b)) => a.cmp(b),
            (PayloadValue::String(a), PayloadValue::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Null => write!(f, "null"),
            PayloadValue::Bool(b) => write!(f, "{b}"),
            PayloadValue::Int(i) => write!(f, "{i}"),
            PayloadValue::Float(x) => write!(f, "{x}"),
            PayloadValue::String(s) => write!(f, "{s}"),
        }
    }
}

/// Dense vector type alias. Length is fixed per table.
pub type Embedding = Vec<f32>;
