//! Full-text index: tokenization, postings, and BM25 ranking.

pub mod index;
pub mod tokenizer;

pub use index::FulltextIndex;
pub use tokenizer::{DefaultTokenizer, Tokenizer};
