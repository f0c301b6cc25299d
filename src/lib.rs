//! # vecdb-core
//!
//! Embedded in-memory vector database: approximate and exact nearest-neighbor
//! search, full-text BM25 relevance, hybrid score fusion, and a chainable
//! query pipeline over fixed-dimension records.
//!
//! ## Quick Start
//!
//! ```rust
//! use vecdb::{Table, TableConfig, PayloadValue};
//! use std::collections::BTreeMap;
//!
//! let table = Table::new(TableConfig::new(3))?;
//!
//! let mut payload = BTreeMap::new();
//! payload.insert("title".to_string(), PayloadValue::String("first record".into()));
//! let id = table.add(payload, Some(vec![1.0, 0.0, 0.0]))?;
//!
//! let hits = table.vector_search(&[1.0, 0.0, 0.0], 5, None)?;
//! assert_eq!(hits[0].0, id);
//! # Ok::<(), vecdb::VdbError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Table
//!
//! A [`Table`] is a fixed-dimension record store: every record holds a dense
//! vector, an arbitrary payload, and derived full-text tokens. A table owns
//! its vector indexes, scalar B-tree indexes, and full-text index, keeping
//! all of them consistent under every mutation.
//!
//! ### Vector indexes
//!
//! Four index kinds are available, chosen per named index: exact
//! [`vector::BruteForceIndex`] scan, [`vector::KdTreeIndex`] space
//! partitioning (euclidean only), [`vector::IvfFlatIndex`] coarse-quantized
//! clustering, and [`vector::LshIndex`] random-hyperplane hashing (cosine
//! only).
//!
//! ### Query pipeline
//!
//! [`query::QueryBuilder`] composes scalar filters, a ranking mode (vector,
//! text, or hybrid), pagination, and projection into one immutable value,
//! executed in a fixed order by [`query::QueryBuilder::execute`].
//!
//! ### Embedding
//!
//! The core never generates embeddings itself: it consumes an
//! [`embedding::Embedder`] capability supplied by the caller, used only when
//! `add`/`update`/`upsert` omit an explicit vector.
//!
//! ## Thread Safety
//!
//! [`Table`] is `Send + Sync` and can be shared across threads using `Arc`.
//! Writes serialize behind one reader/writer lock per table; reads proceed
//! concurrently against a consistent snapshot.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod distance;
mod error;
mod fulltext;
mod hybrid;
mod record;
mod scalar;
mod table;
mod types;

pub mod embedding;
pub mod query;

/// Vector index module: the trait contract plus the four index kinds.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main record-store interface
pub use table::Table;

// Configuration
pub use config::{DistanceMetric, IvfFlatParams, KdTreeParams, LshParams, TableConfig, VectorIndexKind};

// Error handling
pub use error::{Result, VdbError};

// Core types
pub use types::{Embedding, PayloadValue, RecordId};

// Domain types
pub use record::{Payload, Record};

// Query pipeline
pub use query::{QueryBuilder, QueryHit};

// Embedding capability
pub use embedding::{Embedder, NoEmbedder};

// Vector index construction
pub use vector::{VectorIndexHandle, VectorIndexParams};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common vecdb-core usage.
///
/// ```rust
/// use vecdb::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{DistanceMetric, TableConfig, VectorIndexKind};
    pub use crate::error::{Result, VdbError};
    pub use crate::query::{QueryBuilder, QueryHit};
    pub use crate::record::{Payload, Record};
    pub use crate::table::Table;
    pub use crate::types::{PayloadValue, RecordId};
}
