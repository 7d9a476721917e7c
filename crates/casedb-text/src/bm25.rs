use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::BooleanQuery;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use casedb_core::traits::LexicalRanker;

use crate::tantivy_utils::{build_corpus_schema, register_tokenizer, ROW_FIELD, TOKENS_FIELD};

/// BM25 over the token corpus, held in a RAM-only tantivy index.
///
/// The index is never persisted: it is rebuilt in full from the token corpus on
/// load and after every append, since document frequencies change with each
/// new row.
pub struct Bm25Ranker {
    reader: IndexReader,
    row_field: Field,
    tokens_field: Field,
    len: usize,
}

impl LexicalRanker for Bm25Ranker {
    fn build(corpus: &[Vec<String>]) -> Result<Self> {
        let schema = build_corpus_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index);
        let row_field = schema.get_field(ROW_FIELD)?;
        let tokens_field = schema.get_field(TOKENS_FIELD)?;

        // One thread keeps rows in a single segment, in insertion order.
        let mut writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
        for (row, tokens) in corpus.iter().enumerate() {
            writer.add_document(doc!(
                row_field => row as u64,
                tokens_field => tokens.join(" "),
            ))?;
        }
        writer.commit()?;
        writer.wait_merging_threads()?;

        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        debug!(rows = corpus.len(), "bm25 corpus indexed");
        Ok(Self { reader, row_field, tokens_field, len: corpus.len() })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn top_k(&self, query_tokens: &[String], k: usize) -> Result<Vec<(usize, f32)>> {
        let k = k.min(self.len);
        if k == 0 || query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let terms: Vec<Term> = query_tokens.iter().map(|t| Term::from_field_text(self.tokens_field, t)).collect();
        let query = BooleanQuery::new_multiterms_query(terms);
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(addr)?;
            let row = doc
                .get_first(self.row_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow::anyhow!("bm25 document without row"))?;
            hits.push((row as usize, score));
        }
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(hits)
    }
}
