use parking_lot::RwLock;
use std::sync::Arc;

use casedb_core::config::SearchParams;
use casedb_core::traits::{LexicalRanker, VectorBackend};
use casedb_core::types::{Chunk, SearchHit};
use casedb_core::Result;
use casedb_text::Bm25Ranker;
use casedb_vector::LanceVectorIndex;

use crate::index::HybridIndex;
use crate::manifest::IndexStatus;

/// Cloneable handle that serializes writers against readers in-process:
/// searches share a read lock, `add_chunks` takes the write lock.
pub struct SharedIndex<V = LanceVectorIndex, L = Bm25Ranker>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    inner: Arc<RwLock<HybridIndex<V, L>>>,
}

impl<V, L> Clone for SharedIndex<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<V, L> SharedIndex<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    pub fn new(index: HybridIndex<V, L>) -> Self {
        Self { inner: Arc::new(RwLock::new(index)) }
    }

    pub fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchHit>> {
        self.inner.read().search(query, params)
    }

    pub fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        self.inner.write().add_chunks(chunks)
    }

    pub fn status(&self) -> IndexStatus {
        self.inner.read().status()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<V, L> From<HybridIndex<V, L>> for SharedIndex<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    fn from(index: HybridIndex<V, L>) -> Self {
        Self::new(index)
    }
}
