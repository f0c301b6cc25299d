//! Embedding capability used for auto-embedding text payloads.
//!
//! The retrieval core never generates embeddings itself (see the crate's
//! Non-goals): it consumes an `Embed(text) -> vector` capability supplied
//! by the caller, matching the spec's external-interfaces boundary.
//!
//! # Implementing a Custom Provider
//!
//! ```rust
//! use vecdb::embedding::Embedder;
//! use vecdb::{Embedding, Result};
//!
//! struct ConstantEmbedder {
//!     dimension: usize,
//! }
//!
//! impl Embedder for ConstantEmbedder {
//!     fn embed(&self, _text: &str) -> Result<Embedding> {
//!         Ok(vec![0.0; self.dimension])
//!     }
//!
//!     fn dimension(&self) -> usize {
//!         self.dimension
//!     }
//! }
//! ```

use crate::error::{Result, VdbError};
use crate::types::Embedding;

/// Capability for turning text into a dense vector of the table's
/// configured dimension.
///
/// Implementations must be `Send + Sync` so a table can be shared across
/// threads (see [`crate::table::Table`]).
pub trait Embedder: Send + Sync {
    /// Embeds a single piece of text.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embeds a batch of texts. The default implementation calls
    /// [`Embedder::embed`] once per text; implementations backed by a
    /// batching API should override this.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimension of vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// An embedder that always fails.
///
/// Used as the default for tables that expect every vector to be supplied
/// explicitly; calling `add` without a vector on such a table surfaces
/// [`VdbError::EmbeddingMissing`] rather than silently producing a
/// meaningless vector.
#[derive(Clone, Debug)]
pub struct NoEmbedder {
    dimension: usize,
}

impl NoEmbedder {
    /// Creates a `NoEmbedder` for the given table dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Embedder for NoEmbedder {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Err(VdbError::embedding_missing(
            "no embedder configured: provide a vector explicitly or attach an Embedder",
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
