use std::sync::Arc;

use casedb_core::config::{IndexSettings, SearchParams, StanceSettings, TfIdfSettings};
use casedb_core::traits::{Classifier, Embedder};
use casedb_core::types::{Chunk, NliProbs, SearchHit};
use casedb_core::{AbortSignal, Error, ErrorKind, Result};
use casedb_hybrid::HybridIndex;
use casedb_pipeline::{HybridRetriever, Retriever, StanceBuckets, StancePipeline, TermFrequencyRetriever};
use casedb_stance::{StanceClassifier, StanceLabel};

/// Reads the verdict off a `e=<entailment> c=<contradiction>` marker in the premise.
struct MarkerNli;

impl Classifier for MarkerNli {
    fn model_id(&self) -> &str { "marker" }

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(text.split_whitespace().count())
    }

    fn classify(&self, premise: &str, _hypothesis: &str) -> anyhow::Result<NliProbs> {
        if premise.contains("BROKEN") {
            anyhow::bail!("backend timeout");
        }
        let field = |key: &str| -> f32 {
            premise
                .split_whitespace()
                .find_map(|w| w.strip_prefix(key))
                .and_then(|v| v.trim_end_matches('.').parse().ok())
                .unwrap_or(0.1)
        };
        let (entailment, contradiction) = (field("e="), field("c="));
        Ok(NliProbs { contradiction, neutral: (1.0 - entailment - contradiction).max(0.0), entailment })
    }
}

struct FixedRetriever(Vec<SearchHit>);

impl Retriever for FixedRetriever {
    fn retrieve(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

struct FailingRetriever;

impl Retriever for FailingRetriever {
    fn retrieve(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Err(Error::Config("no committed index".into()))
    }
}

fn hit(id: &str, content: &str, rank: usize) -> SearchHit {
    SearchHit::from_chunk(Chunk::new(id, content), 1.0 / (60.0 + rank as f64))
}

fn pipeline(retriever: impl Retriever + 'static, settings: StanceSettings) -> StancePipeline {
    StancePipeline::new(Box::new(retriever), StanceClassifier::new(Arc::new(MarkerNli), settings))
}

fn candidates() -> Vec<SearchHit> {
    vec![
        hit("s1", "Weak support e=0.65 c=0.1.", 1),
        hit("o1", "Clear opposition e=0.05 c=0.9.", 2),
        hit("n1", "Nothing relevant here.", 3),
        hit("s2", "Strong support e=0.95 c=0.01.", 4),
        hit("x1", "This window is BROKEN.", 5),
        hit("s3", "Also strong e=0.95 c=0.02.", 6),
        hit("o2", "Mild opposition e=0.2 c=0.7.", 7),
        hit("n2", "Torn e=0.62 c=0.6.", 8),
    ]
}

fn ids(hits: &[casedb_pipeline::StanceHit]) -> Vec<&str> {
    hits.iter().map(|h| h.hit.chunk_id.as_str()).collect()
}

#[test]
fn hits_are_bucketed_and_ranked() {
    let p = pipeline(FixedRetriever(candidates()), StanceSettings::default());
    let buckets = p.run("issue", "the respondent is liable", &AbortSignal::new()).unwrap();

    assert_eq!(buckets.retrieved, 8);
    assert_eq!(ids(&buckets.support), ["s2", "s3", "s1"], "entailment desc, retrieval order on ties");
    assert_eq!(ids(&buckets.oppose), ["o1", "o2"]);
    assert_eq!(ids(&buckets.neutral), ["n1", "x1", "n2"], "neutral keeps retrieval order");
    assert!(buckets.support.iter().all(|h| h.label == StanceLabel::Support));
    assert_eq!(buckets.support[0].hit.fused_score, 1.0 / 64.0);
}

#[test]
fn classification_failures_are_flagged_not_dropped() {
    let p = pipeline(FixedRetriever(candidates()), StanceSettings::default());
    let buckets = p.run("issue", "stance", &AbortSignal::new()).unwrap();
    assert_eq!(buckets.errors, 1);
    let broken = buckets.neutral.iter().find(|h| h.hit.chunk_id == "x1").unwrap();
    assert_eq!(broken.label, StanceLabel::Neutral);
    assert!(broken.score.is_none());
    assert_eq!(broken.error.as_ref().unwrap().kind, ErrorKind::ModelUnavailable);

    let json = serde_json::to_value(broken).unwrap();
    assert_eq!(json["ChunkID"], "x1");
    assert_eq!(json["label"], "neutral");
    assert_eq!(json["error"]["kind"], "model_unavailable");
}

#[test]
fn buckets_are_truncated_and_retrieval_is_bounded() {
    let settings = StanceSettings { topk_retrieval: 6, topn_return: 1, ..StanceSettings::default() };
    let p = pipeline(FixedRetriever(candidates()), settings);
    let buckets = p.run("issue", "stance", &AbortSignal::new()).unwrap();
    assert_eq!(buckets.retrieved, 6);
    assert_eq!(ids(&buckets.support), ["s2"]);
    assert_eq!(ids(&buckets.oppose), ["o1"]);
    assert_eq!(ids(&buckets.neutral), ["n1"]);
    assert_eq!(buckets.errors, 1, "errors count every flagged hit, shown or not");
}

#[test]
fn abort_and_retrieval_errors_fail_the_run() {
    let p = pipeline(FixedRetriever(candidates()), StanceSettings::default());
    let abort = AbortSignal::new();
    abort.abort();
    assert_eq!(p.run("issue", "stance", &abort).unwrap_err().kind(), ErrorKind::Cancelled);

    let p = pipeline(FailingRetriever, StanceSettings::default());
    assert_eq!(p.run("issue", "stance", &AbortSignal::new()).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn empty_retrieval_gives_empty_buckets() {
    let p = pipeline(FixedRetriever(Vec::new()), StanceSettings::default());
    let buckets = p.run("issue", "stance", &AbortSignal::new()).unwrap();
    assert_eq!(buckets, StanceBuckets::default());
}

fn tfidf_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new("t1", "Graspel contamination of the Rhea river e=0.9 c=0.05."),
        Chunk::new("t2", "The river samples showed no graspel contamination e=0.1 c=0.8."),
        Chunk::new("t3", "Hearing costs were split evenly."),
        Chunk::new("t4", "Costs of counsel were awarded to the claimant."),
        Chunk::new("t1", "duplicate id ignored"),
    ]
}

#[test]
fn term_frequency_retriever_feeds_the_pipeline() {
    let retriever = TermFrequencyRetriever::new(tfidf_chunks(), &TfIdfSettings::default());
    assert_eq!(retriever.len(), 4);
    let hits = retriever.retrieve("graspel contamination river", 10).unwrap();
    let found: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(found.len(), 2);
    assert!(found.contains(&"t1") && found.contains(&"t2"));
    assert!(hits.iter().all(|h| h.fused_score > 0.0 && h.fused_score <= 1.0 + 1e-6));

    let p = pipeline(retriever, StanceSettings::default());
    let buckets = p.run("graspel contamination river", "graspel polluted the river", &AbortSignal::new()).unwrap();
    assert_eq!(ids(&buckets.support), ["t1"]);
    assert_eq!(ids(&buckets.oppose), ["t2"]);
}

struct FixedEmbedder;

impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str { "fixed:d2" }
    fn dim(&self) -> usize { 2 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| if t.contains("river") { vec![1.0, 0.0] } else { vec![0.0, 1.0] }).collect())
    }
}

#[test]
fn hybrid_retriever_uses_limit_as_topn() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = vec![
        Chunk::new("h1", "river pollution e=0.8 c=0.1."),
        Chunk::new("h2", "river sampling methods"),
        Chunk::new("h3", "unrelated procedural order"),
    ];
    let index: HybridIndex = HybridIndex::build(tmp.path(), chunks, Arc::new(FixedEmbedder), &IndexSettings::default()).unwrap();
    let retriever = HybridRetriever::from_index(index, SearchParams::default());

    let all = retriever.retrieve("river pollution", 10).unwrap();
    assert_eq!(all.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>(), ["h1", "h2"]);
    assert_eq!(retriever.retrieve("river pollution", 1).unwrap(), all[..1]);

    let p = pipeline(retriever, StanceSettings::default());
    let buckets = p.run("river pollution", "the river was polluted", &AbortSignal::new()).unwrap();
    assert_eq!(ids(&buckets.support), ["h1"]);
    assert_eq!(ids(&buckets.neutral), ["h2"]);
}
