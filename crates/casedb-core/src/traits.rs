use std::path::Path;

use crate::types::NliProbs;

/// Maps text to fixed-dimension, L2-normalized vectors.
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in the index config (e.g. `bge-m3:d1024`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Natural-language-inference backend.
pub trait Classifier: Send + Sync {
    fn model_id(&self) -> &str;
    /// Token count of `text` as seen by the model; drives premise windowing.
    fn count_tokens(&self, text: &str) -> anyhow::Result<usize>;
    fn classify(&self, premise: &str, hypothesis: &str) -> anyhow::Result<NliProbs>;
}

/// Persisted vector store addressed by row number.
///
/// Rows are assigned in insertion order starting at zero; `search` returns
/// `(row, similarity)` pairs, best first.
pub trait VectorBackend: Send + Sync + Sized {
    fn create(dir: &Path, dim: usize) -> anyhow::Result<Self>;
    fn open(dir: &Path) -> anyhow::Result<Self>;
    fn add(&mut self, vectors: &[Vec<f32>]) -> anyhow::Result<()>;
    fn len(&self) -> anyhow::Result<usize>;
    fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<(usize, f32)>>;
    /// Train an approximate index once the table is large enough. Returns
    /// whether an index was built.
    fn optimize(&mut self, _min_rows: usize) -> anyhow::Result<bool> {
        Ok(false)
    }
    fn is_indexed(&self) -> bool {
        false
    }
}

/// Bag-of-words ranker rebuilt in full from a tokenized corpus.
pub trait LexicalRanker: Send + Sync + Sized {
    fn build(corpus: &[Vec<String>]) -> anyhow::Result<Self>;
    fn len(&self) -> usize;
    /// Rows with a non-zero score, best first.
    fn top_k(&self, query_tokens: &[String], k: usize) -> anyhow::Result<Vec<(usize, f32)>>;
}
