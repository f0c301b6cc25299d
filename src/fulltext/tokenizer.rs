//! Pluggable text tokenization.

/// Splits text into index/query terms. Implementations are free to stem,
/// drop stopwords, or otherwise diverge from [`DefaultTokenizer`]; the
/// full-text index is generic over this trait so a caller can substitute
/// its own.
pub trait Tokenizer: Send + Sync {
    /// Tokenizes `text` into terms, in the order they appear.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercases and splits on Unicode non-alphanumeric boundaries. No
/// stemming, no stopword removal — a deliberate simplification (§4.4).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
