use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use casedb_core::config::{IndexSettings, SearchParams};
use casedb_core::traits::{Embedder, LexicalRanker, VectorBackend};
use casedb_core::types::{Chunk, ChunkId, SearchHit};
use casedb_core::{Error, Result};
use casedb_text::{corpus_tokens, Bm25Ranker};
use casedb_vector::LanceVectorIndex;

use crate::fusion::fuse;
use crate::manifest::{IndexConfig, IndexStatus};
use crate::meta_log::MetaLog;
use crate::store::{self, CONFIG_FILE, META_FILE, ROW_ORDER_FILE, TOKENS_FILE, VECTORS_DIR};

/// Hybrid vector + BM25 index over a persisted chunk corpus.
///
/// Row `i` is the same chunk in `row_order`, `tokens`, the vector store and
/// the lexical ranker. Mutation goes through [`HybridIndex::add_chunks`],
/// which commits a new generation before touching any in-memory field.
pub struct HybridIndex<V = LanceVectorIndex, L = Bm25Ranker>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    dir: PathBuf,
    settings: IndexSettings,
    embedder: Arc<dyn Embedder>,
    config: IndexConfig,
    row_order: Vec<ChunkId>,
    meta: MetaLog,
    tokens: Vec<Vec<String>>,
    vectors: V,
    lexical: L,
}

/// Everything one generation holds, assembled off to the side before commit.
struct Staged<V, L> {
    config: IndexConfig,
    row_order: Vec<ChunkId>,
    meta: MetaLog,
    tokens: Vec<Vec<String>>,
    vectors: V,
    lexical: L,
}

/// Drop malformed chunks, chunks already indexed and repeats within the batch.
fn admit(chunks: Vec<Chunk>, existing: impl Fn(&str) -> bool) -> Vec<Chunk> {
    let mut seen: HashSet<ChunkId> = HashSet::new();
    let mut admitted = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Err(e) = chunk.validate() {
            warn!(error = %e, "skipping chunk");
            continue;
        }
        if existing(&chunk.chunk_id) || !seen.insert(chunk.chunk_id.clone()) {
            continue;
        }
        admitted.push(chunk);
    }
    admitted
}

fn embed_all(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = embedder.embed_batch(texts).map_err(Error::model)?;
    if vectors.len() != texts.len() {
        return Err(Error::ModelUnavailable(format!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != embedder.dim()) {
        return Err(Error::DimensionMismatch { expected: embedder.dim(), actual: v.len() });
    }
    Ok(vectors)
}

impl<V, L> HybridIndex<V, L>
where
    V: VectorBackend,
    L: LexicalRanker,
{
    /// Build a fresh index from `chunks`, replacing whatever `dir` held.
    pub fn build(dir: &Path, chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>, settings: &IndexSettings) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::partial_write("create index dir", e))?;
        // A rebuild replaces everything, so an unreadable pointer only loses its history.
        let previous = match store::read_current(dir) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(dir = %dir.display(), error = %format!("{e:#}"), "ignoring unreadable CURRENT");
                None
            }
        };
        store::remove_uncommitted(dir, previous).map_err(|e| Error::partial_write("remove uncommitted", e))?;

        let input = chunks.len();
        let chunks = admit(chunks, |_| false);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embed_all(embedder.as_ref(), &texts)?;
        let generation = previous.map_or(1, |g| g + 1);
        let gen_dir = store::generation_dir(dir, generation);

        let staged = Self::stage_fresh(&gen_dir, generation, &chunks, &embeddings, embedder.as_ref(), settings);
        let staged = Self::commit(dir, &gen_dir, generation, staged)?;
        store::prune_generations(dir, generation, settings.keep_generations);
        info!(
            dir = %dir.display(),
            generation,
            docs = staged.row_order.len(),
            skipped = input - staged.row_order.len(),
            "index built"
        );
        Ok(Self::from_staged(dir, settings, embedder, staged))
    }

    /// Open the committed generation in `dir`. Nothing on disk is modified.
    pub fn load(dir: &Path, embedder: Arc<dyn Embedder>, settings: &IndexSettings) -> Result<Self> {
        let generation = store::read_current(dir)
            .map_err(|e| Error::config("read CURRENT", e))?
            .ok_or_else(|| Error::Config(format!("no committed index in {}", dir.display())))?;
        let gen_dir = store::generation_dir(dir, generation);

        let config: IndexConfig =
            store::read_json(&gen_dir.join(CONFIG_FILE)).map_err(|e| Error::config("load config", e))?;
        if embedder.dim() != config.vector_dim {
            return Err(Error::DimensionMismatch { expected: config.vector_dim, actual: embedder.dim() });
        }
        if embedder.model_id() != config.embedding_model_id {
            warn!(
                indexed_with = %config.embedding_model_id,
                current = %embedder.model_id(),
                "embedding model differs from the one the index was built with"
            );
        }
        let row_order: Vec<ChunkId> =
            store::read_json(&gen_dir.join(ROW_ORDER_FILE)).map_err(|e| Error::config("load row order", e))?;
        let tokens: Vec<Vec<String>> =
            store::read_json(&gen_dir.join(TOKENS_FILE)).map_err(|e| Error::config("load tokens", e))?;
        let meta = MetaLog::open(&gen_dir.join(META_FILE)).map_err(|e| Error::config("load meta log", e))?;
        let vectors = V::open(&gen_dir.join(VECTORS_DIR)).map_err(|e| Error::config("open vectors", e))?;
        let vector_rows = vectors.len().map_err(|e| Error::config("count vectors", e))?;

        let n = config.doc_count;
        if row_order.len() != n || tokens.len() != n || meta.len() != n || vector_rows != n {
            return Err(Error::Config(format!(
                "generation {generation} is inconsistent: config {n}, row order {}, tokens {}, meta {}, vectors {vector_rows}",
                row_order.len(),
                tokens.len(),
                meta.len()
            )));
        }
        if let Some(id) = row_order.iter().find(|id| !meta.contains(id)) {
            return Err(Error::Config(format!("row order names {id}, which has no meta record")));
        }
        let lexical = L::build(&tokens).map_err(|e| Error::config("build lexical ranker", e))?;

        debug!(dir = %dir.display(), generation, docs = n, "index loaded");
        let staged = Staged { config, row_order, meta, tokens, vectors, lexical };
        Ok(Self::from_staged(dir, settings, embedder, staged))
    }

    /// Hybrid search: ANN and BM25 rankings fused with reciprocal rank fusion.
    pub fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchHit>> {
        let q = embed_all(self.embedder.as_ref(), &[query.to_string()])?
            .pop()
            .ok_or_else(|| Error::ModelUnavailable("embedder returned no vector".into()))?;
        if q.len() != self.config.vector_dim {
            return Err(Error::DimensionMismatch { expected: self.config.vector_dim, actual: q.len() });
        }
        if params.topn == 0 || self.row_order.is_empty() {
            return Ok(Vec::new());
        }

        let n = self.row_order.len();
        let ann: Vec<usize> = self
            .vectors
            .search(&q, params.k_ann)
            .map_err(|e| Error::config("vector search", e))?
            .into_iter()
            .filter(|(row, sim)| *row < n && *sim > self.settings.ann_min_similarity)
            .map(|(row, _)| row)
            .collect();
        let lexical: Vec<usize> = self
            .lexical
            .top_k(&corpus_tokens(query), params.k_bm25)
            .map_err(|e| Error::config("lexical search", e))?
            .into_iter()
            .filter(|(row, score)| *row < n && *score > 0.0)
            .map(|(row, _)| row)
            .collect();

        let fused = fuse(&[ann.as_slice(), lexical.as_slice()], params.rrf_k, self.row_order.as_slice(), params.topn);
        debug!(ann = ann.len(), bm25 = lexical.len(), fused = fused.len(), "hybrid search");

        fused
            .into_iter()
            .map(|(row, score)| {
                let id = &self.row_order[row];
                let chunk = self
                    .meta
                    .get(id)
                    .map_err(|e| Error::config("read meta record", e))?
                    .ok_or_else(|| Error::Config(format!("no meta record for {id}")))?;
                Ok(SearchHit::from_chunk(chunk, score))
            })
            .collect()
    }

    /// Append chunks not yet indexed and commit them as a new generation.
    ///
    /// The lexical ranker is rebuilt over the whole corpus, so the cost grows
    /// with corpus size, not batch size. On any failure the committed
    /// generation and this value are left as they were. A handle whose
    /// generation is no longer the one `CURRENT` names refuses to write.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
        let chunks = admit(chunks, |id| self.meta.contains(id));
        if chunks.is_empty() {
            return Ok(0);
        }
        if self.embedder.dim() != self.config.vector_dim {
            return Err(Error::DimensionMismatch { expected: self.config.vector_dim, actual: self.embedder.dim() });
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embed_all(self.embedder.as_ref(), &texts)?;

        let current = self.config.generation;
        let on_disk = store::read_current(&self.dir).map_err(|e| Error::config("read CURRENT", e))?;
        if on_disk != Some(current) {
            return Err(Error::Config(format!(
                "{} was loaded at generation {current} but CURRENT is now {on_disk:?}; reload before writing",
                self.dir.display()
            )));
        }
        store::remove_uncommitted(&self.dir, Some(current)).map_err(|e| Error::partial_write("remove uncommitted", e))?;
        let generation = current + 1;
        let gen_dir = store::generation_dir(&self.dir, generation);
        let staged = self.stage_append(&gen_dir, generation, &chunks, &embeddings);
        let staged = Self::commit(&self.dir, &gen_dir, generation, staged)?;

        let added = chunks.len();
        self.config = staged.config;
        self.row_order = staged.row_order;
        self.meta = staged.meta;
        self.tokens = staged.tokens;
        self.vectors = staged.vectors;
        self.lexical = staged.lexical;
        store::prune_generations(&self.dir, generation, self.settings.keep_generations);
        info!(generation, added, docs = self.row_order.len(), "chunks appended");
        Ok(added)
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            dir: self.dir.clone(),
            generation: self.config.generation,
            doc_count: self.row_order.len(),
            vector_dim: self.config.vector_dim,
            embedding_model_id: self.config.embedding_model_id.clone(),
            ann_indexed: self.vectors.is_indexed(),
            created_at: self.config.created_at,
        }
    }

    pub fn len(&self) -> usize {
        self.row_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_order.is_empty()
    }

    pub fn row_order(&self) -> &[ChunkId] {
        &self.row_order
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn get(&self, id: &str) -> Result<Option<Chunk>> {
        self.meta.get(id).map_err(|e| Error::config("read meta record", e))
    }

    fn from_staged(dir: &Path, settings: &IndexSettings, embedder: Arc<dyn Embedder>, staged: Staged<V, L>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            settings: settings.clone(),
            embedder,
            config: staged.config,
            row_order: staged.row_order,
            meta: staged.meta,
            tokens: staged.tokens,
            vectors: staged.vectors,
            lexical: staged.lexical,
        }
    }

    fn stage_fresh(
        gen_dir: &Path,
        generation: u64,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        embedder: &dyn Embedder,
        settings: &IndexSettings,
    ) -> anyhow::Result<Staged<V, L>> {
        fs::create_dir_all(gen_dir)?;
        let mut meta = MetaLog::create(&gen_dir.join(META_FILE))?;
        meta.append(chunks)?;
        let mut vectors = V::create(&gen_dir.join(VECTORS_DIR), embedder.dim())?;
        vectors.add(embeddings)?;
        vectors.optimize(settings.ann_min_rows)?;
        let row_order: Vec<ChunkId> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let tokens: Vec<Vec<String>> = chunks.iter().map(|c| corpus_tokens(&c.content)).collect();
        let lexical = L::build(&tokens)?;
        let config = IndexConfig {
            embedding_model_id: embedder.model_id().to_string(),
            doc_count: row_order.len(),
            vector_dim: embedder.dim(),
            generation,
            created_at: Utc::now(),
        };
        let staged = Staged { config, row_order, meta, tokens, vectors, lexical };
        write_artifacts(gen_dir, &staged)?;
        Ok(staged)
    }

    fn stage_append(
        &self,
        gen_dir: &Path,
        generation: u64,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> anyhow::Result<Staged<V, L>> {
        let committed = store::generation_dir(&self.dir, self.config.generation);
        fs::create_dir_all(gen_dir)?;
        store::copy_dir(&committed.join(VECTORS_DIR), &gen_dir.join(VECTORS_DIR))?;
        fs::copy(committed.join(META_FILE), gen_dir.join(META_FILE))?;

        let mut meta = self.meta.relocate(&gen_dir.join(META_FILE));
        meta.append(chunks)?;
        let mut vectors = V::open(&gen_dir.join(VECTORS_DIR))?;
        vectors.add(embeddings)?;
        vectors.optimize(self.settings.ann_min_rows)?;

        let mut row_order = self.row_order.clone();
        row_order.extend(chunks.iter().map(|c| c.chunk_id.clone()));
        let mut tokens = self.tokens.clone();
        tokens.extend(chunks.iter().map(|c| corpus_tokens(&c.content)));
        let lexical = L::build(&tokens)?;
        let config = IndexConfig {
            embedding_model_id: self.config.embedding_model_id.clone(),
            doc_count: row_order.len(),
            vector_dim: self.config.vector_dim,
            generation,
            created_at: Utc::now(),
        };
        let staged = Staged { config, row_order, meta, tokens, vectors, lexical };
        write_artifacts(gen_dir, &staged)?;
        Ok(staged)
    }

    /// Flip `CURRENT` to a fully staged generation, or discard it.
    fn commit(
        dir: &Path,
        gen_dir: &Path,
        generation: u64,
        staged: anyhow::Result<Staged<V, L>>,
    ) -> Result<Staged<V, L>> {
        let committed = staged
            .and_then(|s| store::sync_tree(gen_dir).map(|()| s))
            .and_then(|s| store::write_current(dir, generation).map(|()| s));
        match committed {
            Ok(s) => Ok(s),
            Err(e) => {
                // A pointer that already names this generation keeps its directory.
                let flipped = matches!(store::read_current(dir), Ok(Some(g)) if g == generation);
                if !flipped {
                    if let Err(cleanup) = fs::remove_dir_all(gen_dir) {
                        warn!(dir = %gen_dir.display(), error = %cleanup, "could not remove staged generation");
                    }
                }
                Err(Error::partial_write(&format!("generation {generation}"), format!("{e:#}")))
            }
        }
    }
}

fn write_artifacts<V, L>(gen_dir: &Path, staged: &Staged<V, L>) -> anyhow::Result<()> {
    store::write_json(&gen_dir.join(ROW_ORDER_FILE), &staged.row_order)?;
    store::write_json(&gen_dir.join(TOKENS_FILE), &staged.tokens)?;
    store::write_json(&gen_dir.join(CONFIG_FILE), &staged.config)?;
    Ok(())
}
