//! Term postings and BM25 ranking over indexed documents.

use std::collections::{BTreeSet, HashMap};

use crate::types::RecordId;

use super::{DefaultTokenizer, Tokenizer};

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Inverted index over tokenized document text, ranked with BM25.
pub struct FulltextIndex {
    tokenizer: Box<dyn Tokenizer>,
    postings: HashMap<String, Vec<(RecordId, u32)>>,
    doc_lengths: HashMap<RecordId, usize>,
    doc_terms: HashMap<RecordId, Vec<String>>,
}

impl Default for FulltextIndex {
    fn default() -> Self {
        Self::new(Box::new(DefaultTokenizer))
    }
}

impl FulltextIndex {
    /// Creates an empty index using `tokenizer` for both documents and
    /// queries.
    pub fn new(tokenizer: Box<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            postings: HashMap::new(),
            doc_lengths: HashMap::new(),
            doc_terms: HashMap::new(),
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Returns true if no documents are indexed.
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Tokenizes `text` with this index's configured tokenizer, without
    /// indexing it. Useful for callers (e.g. the record store) that want to
    /// cache the token list alongside the document.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    /// Indexes `text` under `id`, replacing any prior content for that id.
    pub fn index(&mut self, id: RecordId, text: &str) {
        let tokens = self.tokenizer.tokenize(text);
        self.index_tokens(id, tokens);
    }

    /// Indexes a pre-tokenized document under `id`, replacing any prior
    /// content for that id.
    pub fn index_tokens(&mut self, id: RecordId, tokens: Vec<String>) {
        self.remove(id);
        if tokens.is_empty() {
            return;
        }
        let mut tf: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.clone()).or_insert(0) += 1;
        }
        self.doc_lengths.insert(id, tokens.len());
        for (term, count) in &tf {
            self.postings.entry(term.clone()).or_default().push((id, *count));
        }
        self.doc_terms.insert(id, tf.into_keys().collect());
    }

    /// Removes all indexed content for `id`. No-op if absent.
    pub fn remove(&mut self, id: RecordId) {
        if let Some(terms) = self.doc_terms.remove(&id) {
            for term in terms {
                if let Some(list) = self.postings.get_mut(&term) {
                    list.retain(|(existing, _)| *existing != id);
                    if list.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
        }
        self.doc_lengths.remove(&id);
    }

    fn average_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.doc_lengths.values().sum::<usize>() as f64 / self.doc_lengths.len() as f64
    }

    /// Scores every document matching at least one query term, returning up
    /// to `k` results in descending BM25 score, ties broken by ascending id.
    /// `filter`, if present, restricts results to ids for which it returns
    /// `true`.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&dyn Fn(RecordId) -> bool>,
    ) -> Vec<(RecordId, f32)> {
        let terms: BTreeSet<String> = self.tokenizer.tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Vec::new();
        }
        let n = self.doc_lengths.len() as f64;
        let avgdl = self.average_doc_length();

        let mut scores: HashMap<RecordId, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f64;
            let idf = (((n - df + 0.5) / (df + 0.5)) + 1.0).ln().max(0.0);
            for (id, tf) in postings {
                if let Some(f) = filter {
                    if !f(*id) {
                        continue;
                    }
                }
                let dl = *self.doc_lengths.get(id).unwrap_or(&0) as f64;
                let denom = *tf as f64 + K1 * (1.0 - B + B * dl / avgdl.max(1e-9));
                let score = idf * (*tf as f64 * (K1 + 1.0)) / denom;
                *scores.entry(*id).or_insert(0.0) += score;
            }
        }

        let mut result: Vec<(RecordId, f32)> =
            scores.into_iter().map(|(id, s)| (id, s as f32)).collect();
        result.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        result.truncate(k);
        result
    }
}
