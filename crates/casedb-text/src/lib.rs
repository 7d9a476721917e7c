//! casedb-text
//!
//! Lexical ranking over the chunk corpus: a tantivy BM25 ranker rebuilt from
//! the persisted token corpus, and a TF-IDF cosine ranker for indexless
//! retrieval.

pub mod bm25;
pub mod tantivy_utils;
pub mod tfidf;

pub use bm25::Bm25Ranker;
pub use tfidf::TfIdfIndex;

/// Corpus tokenization shared by indexing and querying: lowercase, split on
/// whitespace. No stemming, no stop words.
pub fn corpus_tokens(text: &str) -> Vec<String> {
    text.to_lowercase().split_whitespace().map(str::to_string).collect()
}
