use std::collections::HashSet;
use tracing::{debug, warn};

use casedb_core::config::{SearchParams, TfIdfSettings};
use casedb_core::traits::{LexicalRanker, VectorBackend};
use casedb_core::types::{Chunk, SearchHit};
use casedb_core::Result;
use casedb_hybrid::{HybridIndex, SharedIndex};
use casedb_text::{Bm25Ranker, TfIdfIndex};
use casedb_vector::LanceVectorIndex;

/// Source of candidate chunks for a query, best first.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Hybrid index search with fixed list depths; `limit` becomes `topn`.
pub struct HybridRetriever<V = LanceVectorIndex, L = Bm25Ranker>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    index: SharedIndex<V, L>,
    params: SearchParams,
}

impl<V, L> HybridRetriever<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    pub fn new(index: SharedIndex<V, L>, params: SearchParams) -> Self {
        Self { index, params }
    }

    pub fn from_index(index: HybridIndex<V, L>, params: SearchParams) -> Self {
        Self::new(SharedIndex::new(index), params)
    }
}

impl<V, L> Retriever for HybridRetriever<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let params = SearchParams { topn: limit, ..self.params };
        self.index.search(query, &params)
    }
}

/// TF-IDF cosine over an in-memory chunk set, for corpora without a
/// persisted index. `fused_score` carries the cosine similarity.
pub struct TermFrequencyRetriever {
    index: TfIdfIndex,
    chunks: Vec<Chunk>,
}

impl TermFrequencyRetriever {
    /// Malformed chunks are skipped and repeated ids keep their first occurrence.
    pub fn new(chunks: Vec<Chunk>, settings: &TfIdfSettings) -> Self {
        let mut seen = HashSet::new();
        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| match c.validate() {
                Ok(()) => seen.insert(c.chunk_id.clone()),
                Err(e) => {
                    warn!(error = %e, "skipping chunk");
                    false
                }
            })
            .collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let index = TfIdfIndex::build(&texts, settings);
        debug!(docs = chunks.len(), vocab = index.vocab_len(), "tf-idf retriever ready");
        Self { index, chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Retriever for TermFrequencyRetriever {
    fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self
            .index
            .search(query, limit)
            .into_iter()
            .map(|(row, score)| SearchHit::from_chunk(self.chunks[row].clone(), score as f64))
            .collect())
    }
}
